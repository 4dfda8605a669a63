//! Hearing-safety helpers for displaying a listening level

use serde::Serialize;

/// Exposure band for a listening level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    VerySafe,
    Safe,
    Caution,
    Warning,
    Danger,
}

impl SafetyLevel {
    pub fn from_spl(spl: f32) -> Self {
        if spl <= 65.0 {
            Self::VerySafe
        } else if spl < 73.0 {
            Self::Safe
        } else if spl < 80.0 {
            Self::Caution
        } else if spl < 85.0 {
            Self::Warning
        } else {
            Self::Danger
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VerySafe => "very safe",
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// NIOSH permissible exposure in hours, with a 20% margin
///
/// 85 dB for 8 hours, halved for every 3 dB above. `None` below 80 dB,
/// where exposure time is not limited.
pub fn safe_listening_hours(spl: f32) -> Option<f32> {
    if spl < 80.0 {
        return None;
    }
    let hours = 8.0 / 2f32.powf((spl - 85.0) / 3.0);
    Some(hours * 0.8)
}

/// Short human-readable safe listening time, e.g. `2.5h` or `12m`
pub fn format_safe_time(spl: f32) -> String {
    let Some(hours) = safe_listening_hours(spl) else {
        return "24h+".to_string();
    };

    if hours >= 24.0 {
        "24h+".to_string()
    } else if hours >= 1.0 {
        format!("{:.1}h", hours)
    } else if hours >= 0.0167 {
        format!("{}m", (hours * 60.0) as u32)
    } else {
        format!("{}s", (hours * 3600.0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_bands() {
        assert_eq!(SafetyLevel::from_spl(50.0), SafetyLevel::VerySafe);
        assert_eq!(SafetyLevel::from_spl(65.0), SafetyLevel::VerySafe);
        assert_eq!(SafetyLevel::from_spl(70.0), SafetyLevel::Safe);
        assert_eq!(SafetyLevel::from_spl(75.0), SafetyLevel::Caution);
        assert_eq!(SafetyLevel::from_spl(82.0), SafetyLevel::Warning);
        assert_eq!(SafetyLevel::from_spl(85.0), SafetyLevel::Danger);
    }

    #[test]
    fn test_safe_hours() {
        assert_eq!(safe_listening_hours(79.9), None);
        assert!((safe_listening_hours(85.0).unwrap() - 6.4).abs() < 1e-4);
        assert!((safe_listening_hours(88.0).unwrap() - 3.2).abs() < 1e-4);
    }

    #[test]
    fn test_format_safe_time() {
        assert_eq!(format_safe_time(70.0), "24h+");
        assert_eq!(format_safe_time(80.0), "20.3h");
        assert_eq!(format_safe_time(85.0), "6.4h");
        assert_eq!(format_safe_time(98.0), "19m");
        assert_eq!(format_safe_time(120.0), "7s");
    }
}
