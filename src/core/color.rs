use std::env;

pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const BOLD: &'static str = "\x1b[1m";

    fn is_enabled() -> bool {
        if let Ok(color_value) = env::var("MFLOW_COLOR") {
            match color_value.as_str() {
                "always" => return true,
                "never" => return false,
                _ => {}
            }
        }
        atty::is(atty::Stream::Stdout)
    }

    pub fn colorize(text: &str, color: &str) -> String {
        if Self::is_enabled() {
            format!("{}{}{}", color, text, Self::RESET)
        } else {
            text.to_string()
        }
    }

    pub fn red(text: &str) -> String {
        Self::colorize(text, Self::RED)
    }

    pub fn green(text: &str) -> String {
        Self::colorize(text, Self::GREEN)
    }

    pub fn yellow(text: &str) -> String {
        Self::colorize(text, Self::YELLOW)
    }

    pub fn bold(text: &str) -> String {
        Self::colorize(text, Self::BOLD)
    }
}
