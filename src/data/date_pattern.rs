//! Translation between ARFF's Java-style date patterns (`yyyy-MM-dd'T'HH:mm:ss`)
//! and the chrono strftime patterns date attributes use internally.

use anyhow::{Result, bail};

/// Java letter runs and their strftime equivalents. Longer runs first.
const TOKENS: &[(&str, &str)] = &[
    ("yyyy", "%Y"),
    ("yy", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("SSS", "%3f"),
    ("EEEE", "%A"),
    ("EEE", "%a"),
    ("a", "%p"),
    ("Z", "%z"),
    ("z", "%Z"),
];

pub fn java_to_strftime(pattern: &str) -> Result<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // quoted literal; '' is an escaped quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
        } else if c.is_ascii_alphabetic() {
            let run = chars[i..].iter().take_while(|&&d| d == c).count();
            let letters: String = std::iter::repeat(c).take(run).collect();
            let Some((_, strf)) = TOKENS.iter().find(|(java, _)| *java == letters) else {
                bail!("unsupported date pattern letters '{letters}' in '{pattern}'");
            };
            out.push_str(strf);
            i += run;
        } else {
            push_literal(&mut out, c);
            i += 1;
        }
    }
    Ok(out)
}

pub fn strftime_to_java(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let mut spec = String::from("%");
                if chars.peek() == Some(&'3') {
                    spec.push('3');
                    chars.next();
                }
                match chars.next() {
                    Some('%') => out.push('%'),
                    Some(d) => {
                        spec.push(d);
                        let Some((java, _)) = TOKENS.iter().find(|(_, strf)| *strf == spec) else {
                            bail!("strftime specifier '{spec}' has no ARFF equivalent");
                        };
                        out.push_str(java);
                    }
                    None => bail!("dangling '%' in date format '{pattern}'"),
                }
            }
            '\'' => out.push_str("''"),
            c if c.is_ascii_alphabetic() => {
                out.push('\'');
                out.push(c);
                out.push('\'');
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::attribute::DEFAULT_DATE_FORMAT;

    #[test]
    fn arff_default_pattern_maps_to_iso() {
        assert_eq!(
            java_to_strftime("yyyy-MM-dd'T'HH:mm:ss").unwrap(),
            DEFAULT_DATE_FORMAT
        );
        assert_eq!(
            strftime_to_java(DEFAULT_DATE_FORMAT).unwrap(),
            "yyyy-MM-dd'T'HH:mm:ss"
        );
    }

    #[test]
    fn quotes_and_percent_survive() {
        assert_eq!(java_to_strftime("dd/MM/yy 'o''clock'").unwrap(), "%d/%m/%y o'clock");
        assert_eq!(java_to_strftime("yyyy%").unwrap(), "%Y%%");
        assert_eq!(strftime_to_java("%Y%%").unwrap(), "yyyy%");
    }

    #[test]
    fn unknown_tokens_fail() {
        assert!(java_to_strftime("QQ").is_err());
        assert!(strftime_to_java("%j").is_err());
    }
}
