/// Single-line text buffer behind every prompt.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    /// Cursor position in characters.
    cursor: usize,
}

impl TextInput {
    pub fn open(&mut self, initial: &str) {
        self.value = initial.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(idx, _)| idx)
            .unwrap_or(self.value.len())
    }
}

pub fn parse_ttl(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("TTL value cannot be empty. Use 0 to remove TTL.".to_string());
    }
    match raw.parse::<i64>() {
        Ok(ttl) if ttl < 0 => Err("TTL value must be 0 or positive".to_string()),
        Ok(ttl) => Ok(ttl),
        Err(_) => Err("TTL value must be a whole number".to_string()),
    }
}

pub fn parse_db_index(raw: &str) -> Result<u32, String> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| "Invalid database number".to_string())
}

pub fn parse_key_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        Err("Key name cannot be empty".to_string())
    } else {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_respects_cursor_and_multibyte_text() {
        let mut input = TextInput::default();
        input.open("héllo");
        input.move_left();
        input.move_left();
        input.insert('X');
        assert_eq!(input.value(), "hélXlo");

        input.move_home();
        input.delete();
        assert_eq!(input.value(), "élXlo");

        input.move_end();
        input.backspace();
        assert_eq!(input.value(), "élXl");
        assert_eq!(input.cursor(), 4);
    }

    #[test]
    fn backspace_at_start_is_a_no_op() {
        let mut input = TextInput::default();
        input.open("a");
        input.move_home();
        input.backspace();
        assert_eq!(input.value(), "a");
    }

    #[test]
    fn ttl_validation_messages() {
        assert_eq!(parse_ttl(" 30 "), Ok(30));
        assert_eq!(parse_ttl("0"), Ok(0));
        assert_eq!(
            parse_ttl(""),
            Err("TTL value cannot be empty. Use 0 to remove TTL.".to_string())
        );
        assert_eq!(parse_ttl("-5"), Err("TTL value must be 0 or positive".to_string()));
        assert_eq!(parse_ttl("soon"), Err("TTL value must be a whole number".to_string()));
    }

    #[test]
    fn db_and_key_validation() {
        assert_eq!(parse_db_index("3"), Ok(3));
        assert!(parse_db_index("-1").is_err());
        assert!(parse_db_index("x").is_err());
        assert_eq!(parse_key_name("  new:key "), Ok("new:key".to_string()));
        assert_eq!(parse_key_name("   "), Err("Key name cannot be empty".to_string()));
    }
}
