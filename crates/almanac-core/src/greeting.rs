use std::fmt;

use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;

pub fn current_hour(timezone: Option<Tz>) -> u32 {
    match timezone {
        Some(tz) => Utc::now().with_timezone(&tz).hour(),
        None => Local::now().hour(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    pub fn for_hour(hour: u32) -> Self {
        if hour < 12 {
            Self::Morning
        } else if hour < 18 {
            Self::Afternoon
        } else {
            Self::Evening
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub part: DayPart,
    pub name: String,
}

impl Greeting {
    pub fn new(hour: u32, name: &str) -> Self {
        let name = name.trim();
        Self {
            part: DayPart::for_hour(hour),
            name: if name.is_empty() {
                "User".to_string()
            } else {
                name.to_string()
            },
        }
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Good {}, {}!", self.part.label(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_boundaries() {
        assert_eq!(DayPart::for_hour(0), DayPart::Morning);
        assert_eq!(DayPart::for_hour(11), DayPart::Morning);
        assert_eq!(DayPart::for_hour(12), DayPart::Afternoon);
        assert_eq!(DayPart::for_hour(17), DayPart::Afternoon);
        assert_eq!(DayPart::for_hour(18), DayPart::Evening);
    }

    #[test]
    fn greeting_text() {
        assert_eq!(Greeting::new(9, "").to_string(), "Good Morning, User!");
        assert_eq!(Greeting::new(20, "Ada").to_string(), "Good Evening, Ada!");
    }
}
