//! Liveprog (EEL) gain scripts

/// Script location relative to the DSP root
pub const SCRIPT_PATH: &str = "Liveprog/loudnessCalibrated.eel";

/// Gain script variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainScript {
    /// Apply `total_gain_db` to both channels
    Calibrated(f32),
    /// Unity gain
    Bypass,
}

impl GainScript {
    pub fn render(&self) -> String {
        match self {
            Self::Calibrated(total_gain_db) => calibrated_script(*total_gain_db),
            Self::Bypass => bypass_script(),
        }
    }
}

/// Script applying a fixed gain in dB
pub fn calibrated_script(total_gain_db: f32) -> String {
    format!(
        "desc: Calibrated Loudness Gain\n\
         \n\
         @init\n\
         DB_2_LOG = 0.11512925464970228420089957273422;\n\
         gainLin = exp({:.2} * DB_2_LOG);\n\
         \n\
         @sample\n\
         spl0 *= gainLin;\n\
         spl1 *= gainLin;\n",
        total_gain_db
    )
}

/// Unity-gain script written while loudness compensation is off
pub fn bypass_script() -> String {
    "desc: Loudness Bypass\n\
     \n\
     @init\n\
     gainLin = 1.0;\n\
     \n\
     @sample\n\
     spl0 *= gainLin;\n\
     spl1 *= gainLin;\n"
        .to_string()
}
