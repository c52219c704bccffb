use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// A composite font descriptor in text-widget list form, e.g.
/// `{Segoe UI} 11 bold italic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontDescriptor {
    pub family: String,
    /// Point size; negative values are pixel sizes.
    pub size: Option<i32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub overstrike: bool,
}

impl FontDescriptor {
    pub fn new(family: impl Into<String>, size: Option<i32>) -> Self {
        FontDescriptor {
            family: family.into(),
            size,
            bold: false,
            italic: false,
            underline: false,
            overstrike: false,
        }
    }

    pub fn with_family(&self, family: impl Into<String>) -> Self {
        FontDescriptor {
            family: family.into(),
            ..self.clone()
        }
    }

    pub fn with_size(&self, size: i32) -> Self {
        FontDescriptor {
            size: Some(size),
            ..self.clone()
        }
    }

    pub fn bolded(&self) -> Self {
        FontDescriptor {
            bold: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_family(f, &self.family)?;
        if let Some(size) = self.size {
            write!(f, " {}", size)?;
        }
        if self.bold {
            write!(f, " bold")?;
        }
        if self.italic {
            write!(f, " italic")?;
        }
        if self.underline {
            write!(f, " underline")?;
        }
        if self.overstrike {
            write!(f, " overstrike")?;
        }
        Ok(())
    }
}

/// Families with list syntax in them are backslash-escaped, otherwise
/// braced when they hold whitespace or start with `-`.
fn write_family(f: &mut fmt::Formatter<'_>, family: &str) -> fmt::Result {
    if family.contains(['{', '}', '\\']) {
        for (i, c) in family.chars().enumerate() {
            if matches!(c, '{' | '}' | '\\') || c.is_whitespace() || (i == 0 && c == '-') {
                write!(f, "\\")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    } else if family.is_empty() || family.starts_with('-') || family.contains(char::is_whitespace) {
        write!(f, "{{{}}}", family)
    } else {
        write!(f, "{}", family)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable font descriptor: {0:?}")]
pub struct FontError(pub String);

impl FromStr for FontDescriptor {
    type Err = FontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FontError(s.to_string());
        // Option-list form (`-family X -size 12`) is not a descriptor we emit
        if s.trim_start().starts_with('-') {
            return Err(err());
        }
        let words = split_list(s).ok_or_else(err)?;
        let mut words = words.into_iter();
        let family = words.next().ok_or_else(err)?;

        let mut font = FontDescriptor::new(family, None);
        let mut rest = words.peekable();
        if let Some(first) = rest.peek()
            && let Ok(size) = first.parse::<i32>()
        {
            font.size = Some(size);
            rest.next();
        }
        for word in rest {
            match word.as_str() {
                "bold" => font.bold = true,
                "italic" => font.italic = true,
                "underline" => font.underline = true,
                "overstrike" => font.overstrike = true,
                "normal" | "roman" => {}
                _ => return Err(err()),
            }
        }
        Ok(font)
    }
}

impl Serialize for FontDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Split a whitespace-separated list where `{...}` groups one word and a
/// backslash outside braces takes the next character literally. Returns
/// `None` on unbalanced braces or a trailing backslash.
fn split_list(s: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = s.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(c) = chars.next() else {
            break;
        };
        let mut word = String::new();
        if c == '{' {
            let mut depth = 1;
            loop {
                match chars.next()? {
                    '{' => {
                        depth += 1;
                        word.push('{');
                    }
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        word.push('}');
                    }
                    other => word.push(other),
                }
            }
        } else {
            let mut c = c;
            loop {
                if c == '\\' {
                    word.push(chars.next()?);
                } else {
                    word.push(c);
                }
                match chars.peek() {
                    Some(next) if !next.is_whitespace() => {}
                    _ => break,
                }
                c = chars.next()?;
            }
        }
        words.push(word);
    }
    Some(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_braced_family_with_modifiers() {
        let font: FontDescriptor = "{Segoe UI} 11 bold italic".parse().unwrap();
        assert_eq!(font.family, "Segoe UI");
        assert_eq!(font.size, Some(11));
        assert!(font.bold);
        assert!(font.italic);
    }

    #[test]
    fn parse_family_only() {
        let font: FontDescriptor = "Courier".parse().unwrap();
        assert_eq!(font, FontDescriptor::new("Courier", None));
    }

    #[test]
    fn display_braces_only_when_needed() {
        assert_eq!(FontDescriptor::new("Arial", Some(12)).to_string(), "Arial 12");
        assert_eq!(
            FontDescriptor::new("Segoe UI", Some(-14)).bolded().to_string(),
            "{Segoe UI} -14 bold"
        );
    }

    #[test]
    fn display_parse_agree() {
        let font = FontDescriptor {
            family: "DejaVu Sans Mono".into(),
            size: Some(9),
            bold: true,
            italic: true,
            underline: false,
            overstrike: false,
        };
        assert_eq!(font.to_string().parse::<FontDescriptor>().unwrap(), font);
    }

    #[test]
    fn display_parse_agree_for_odd_families() {
        let families = [
            "{Odd",
            "Odd}",
            "a{b}c",
            "back\\slash",
            "{two words",
            "",
            "-dash",
            "-dash two",
            "-{",
        ];
        for family in families {
            let font = FontDescriptor::new(family, Some(11));
            let text = font.to_string();
            assert_eq!(text.parse::<FontDescriptor>(), Ok(font), "via {:?}", text);
        }
    }

    #[test]
    fn escaped_family_form() {
        assert_eq!(FontDescriptor::new("{Odd", Some(11)).to_string(), "\\{Odd 11");
        assert_eq!(FontDescriptor::new("-dash", None).to_string(), "{-dash}");
    }

    #[test]
    fn parse_underline_and_overstrike() {
        let font: FontDescriptor = "Arial 12 bold underline overstrike".parse().unwrap();
        assert_eq!(font.family, "Arial");
        assert_eq!(font.size, Some(12));
        assert!(font.bold);
        assert!(font.underline);
        assert!(font.overstrike);
        assert!(!font.italic);
        assert_eq!(font.to_string(), "Arial 12 bold underline overstrike");
    }

    #[test]
    fn reject_unparsable_descriptors() {
        assert!("".parse::<FontDescriptor>().is_err());
        assert!("{Segoe UI 11".parse::<FontDescriptor>().is_err());
        assert!("-family Arial -size 12".parse::<FontDescriptor>().is_err());
        assert!("Arial 12 sparkly".parse::<FontDescriptor>().is_err());
    }
}
