use std::fmt;

use serde::Serialize;

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl Stats {
    pub fn push(&mut self, task: &Task) {
        self.total = self.total.saturating_add(1);
        if task.completed {
            self.completed = self.completed.saturating_add(1);
        } else {
            self.pending = self.pending.saturating_add(1);
        }
    }

    pub fn collect<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut stats = Self::default();
        for task in tasks {
            stats.push(task);
        }
        stats
    }

    pub fn motivation(&self) -> Motivation {
        Motivation::for_counts(self.completed, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motivation {
    GetStarted,
    AllDone,
    GreatProgress,
    Halfway,
    MakingProgress,
    FirstSteps,
}

impl Motivation {
    /// Thresholds are quarters of the total, compared without floats.
    pub fn for_counts(completed: usize, total: usize) -> Self {
        if total == 0 {
            return Self::GetStarted;
        }
        if completed >= total {
            return Self::AllDone;
        }

        let quarters = completed.saturating_mul(4);
        if quarters >= total.saturating_mul(3) {
            Self::GreatProgress
        } else if quarters >= total.saturating_mul(2) {
            Self::Halfway
        } else if quarters >= total {
            Self::MakingProgress
        } else {
            Self::FirstSteps
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::GetStarted => "Let's get started! Add your first task.",
            Self::AllDone => "Amazing! All tasks completed! 🎉",
            Self::GreatProgress => "Great progress! Keep going! 💪",
            Self::Halfway => "You're halfway there! 😊",
            Self::MakingProgress => "Making progress! Keep it up! 👍",
            Self::FirstSteps => "Getting started is the hardest part! You got this! 💯",
        }
    }
}

impl fmt::Display for Motivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
