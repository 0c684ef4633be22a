//! Generic `?` placeholder translation

use std::borrow::Cow;

/// Native bind-parameter marker of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, used by SQLite and MySQL
    QuestionMark,
    /// `$1`, `$2`, ... used by PostgreSQL
    Numbered,
}

/// Rewrite every generic `?` marker into the driver's marker
///
/// Markers inside single-quoted literals and double-quoted identifiers are
/// left untouched.
pub fn translate(sql: &str, style: PlaceholderStyle) -> Cow<'_, str> {
    if style == PlaceholderStyle::QuestionMark || !sql.contains('?') {
        return Cow::Borrowed(sql);
    }

    let mut output = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;

    for character in sql.chars() {
        match (quote, character) {
            (Some(open), c) if c == open => {
                quote = None;
                output.push(c);
            }
            (Some(_), c) => output.push(c),
            (None, c @ ('\'' | '"')) => {
                quote = Some(c);
                output.push(c);
            }
            (None, '?') => {
                index += 1;
                output.push('$');
                output.push_str(&index.to_string());
            }
            (None, c) => output.push(c),
        }
    }

    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_mark_is_untouched() {
        let sql = "SELECT * FROM \"blogs\" WHERE \"id\" = ?";
        assert!(matches!(
            translate(sql, PlaceholderStyle::QuestionMark),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_numbered() {
        assert_eq!(
            translate(
                "UPDATE \"users\" SET \"name\" = ?, \"age\" = ? WHERE \"id\" = ?",
                PlaceholderStyle::Numbered
            ),
            "UPDATE \"users\" SET \"name\" = $1, \"age\" = $2 WHERE \"id\" = $3"
        );
    }

    #[test]
    fn test_literals_are_skipped() {
        assert_eq!(
            translate(
                "SELECT * FROM t WHERE a = '?' AND \"b?\" = ? LIMIT ?",
                PlaceholderStyle::Numbered
            ),
            "SELECT * FROM t WHERE a = '?' AND \"b?\" = $1 LIMIT $2"
        );
        // doubled quote inside a literal closes and reopens it
        assert_eq!(
            translate("SELECT 'it''s?' , ?", PlaceholderStyle::Numbered),
            "SELECT 'it''s?' , $1"
        );
    }
}
