use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl Author {
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: Utc::now(),
        }
    }

    /// Parse an author line in the format "Name <email> timestamp timezone".
    pub fn parse(author_str: &str) -> Result<Self, String> {
        let re = Regex::new(r"^(.*) <(.*)> (\d+) (.*)$").unwrap();

        let caps = re
            .captures(author_str)
            .ok_or_else(|| format!("Invalid author format: {}", author_str))?;

        let name = caps.get(1).unwrap().as_str().to_string();
        let email = caps.get(2).unwrap().as_str().to_string();
        let timestamp_str = caps.get(3).unwrap().as_str();

        let timestamp_i64 = timestamp_str
            .parse::<i64>()
            .map_err(|_| format!("Invalid timestamp: {}", timestamp_str))?;

        let timestamp = match Utc.timestamp_opt(timestamp_i64, 0) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return Err(format!("Invalid timestamp value: {}", timestamp_i64)),
        };

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} +0000",
            self.name,
            self.email,
            self.timestamp.timestamp()
        )
    }
}
