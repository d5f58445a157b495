use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Init,
    Up,
    Down,
    Unknown,
    Bad,
}

impl Default for Status {
    fn default() -> Self {
        Self::Init
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "init" => Status::Init,
            "up" => Status::Up,
            "down" => Status::Down,
            "bad" => Status::Bad,
            _ => Status::Unknown,
        })
    }
}

impl Status {
    pub fn title(&self) -> &'static str {
        match self {
            Status::Init => "Initialization",
            Status::Up => "Success",
            Status::Down => "Error",
            Status::Unknown => "Unknown",
            Status::Bad => "Bad",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Init => "init",
            Status::Up => "up",
            Status::Down => "down",
            Status::Unknown => "unknown",
            Status::Bad => "bad",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Status::Init => "🔎",
            Status::Up => "✅",
            Status::Down => "❌",
            Status::Unknown => "⛔️",
            Status::Bad => "🚫",
        }
    }

    /// Numeric value exported to the metrics endpoint.
    pub fn value(&self) -> i64 {
        *self as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(Status::Up.as_str(), "up");
        assert_eq!(Status::Down.title(), "Error");
        assert_eq!(Status::Bad.emoji(), "🚫");
        assert_eq!(Status::Down.to_string(), "down");
        assert_eq!(Status::Down.value(), 2);

        assert_eq!("UP".parse::<Status>().unwrap(), Status::Up);
        assert_eq!(" bad ".parse::<Status>().unwrap(), Status::Bad);
        assert_eq!("wrong".parse::<Status>().unwrap(), Status::Unknown);
    }

    #[test]
    fn test_status_yaml() {
        let s: Status = serde_yaml::from_str("down").unwrap();
        assert_eq!(s, Status::Down);
        assert_eq!(serde_yaml::to_string(&Status::Init).unwrap(), "init\n");
        assert!(serde_yaml::from_str::<Status>("- bad").is_err());
    }
}
