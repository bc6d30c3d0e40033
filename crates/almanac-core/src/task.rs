use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub text: String,

    #[serde(default, with = "optional_time")]
    pub time: Option<String>,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Builds a pending task from user input. Only the text is checked, and
    /// only for being blank once trimmed.
    pub fn new(text: &str, time: Option<&str>) -> anyhow::Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("task text cannot be empty"));
        }

        let time = time
            .map(crate::datekey::normalize_time)
            .filter(|value| !value.is_empty());

        Ok(Self {
            text: text.to_string(),
            time,
            completed: false,
        })
    }

    pub fn toggle(&mut self) {
        self.completed = !self.completed;
    }
}

// Stores written by the browser widget use "" for "no time".
mod optional_time {
    use super::*;

    pub fn serialize<S>(time: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(time.as_deref().unwrap_or_default())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|value| !value.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_trims_and_starts_pending() {
        let task = Task::new("  water plants  ", Some(" 7:05pm ")).expect("task");
        assert_eq!(task.text, "water plants");
        assert_eq!(task.time.as_deref(), Some("19:05"));
        assert!(!task.completed);
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(Task::new("   ", None).is_err());
    }

    #[test]
    fn blank_time_means_no_time() {
        let task = Task::new("read", Some("  ")).expect("task");
        assert_eq!(task.time, None);
    }

    #[test]
    fn reads_widget_json_with_empty_time() {
        let raw = r#"{"text":"call mom","time":"","completed":true}"#;
        let task: Task = serde_json::from_str(raw).expect("parse");
        assert_eq!(task.time, None);
        assert!(task.completed);

        let back = serde_json::to_string(&task).expect("serialize");
        assert_eq!(back, raw);
    }
}
