//! Six-cell verification code entry.

pub const OTP_LENGTH: usize = 6;

/// True for exactly [`OTP_LENGTH`] ASCII digits.
#[must_use]
pub fn is_valid_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// One digit per cell, with a cursor the UI renders as input focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpInput {
    cells: [Option<char>; OTP_LENGTH],
    focus: usize,
}

impl OtpInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Type into the focused cell and advance. Non-digits are rejected.
    pub fn enter(&mut self, ch: char) -> bool {
        if !ch.is_ascii_digit() {
            return false;
        }
        self.cells[self.focus] = Some(ch);
        self.focus = (self.focus + 1).min(OTP_LENGTH - 1);
        true
    }

    /// Fill from the first cell with the digits found in `text`.
    ///
    /// Returns how many cells were filled.
    pub fn paste(&mut self, text: &str) -> usize {
        let digits: Vec<char> = text.chars().filter(char::is_ascii_digit).take(OTP_LENGTH).collect();
        if digits.is_empty() {
            return 0;
        }
        self.cells = [None; OTP_LENGTH];
        for (cell, digit) in self.cells.iter_mut().zip(&digits) {
            *cell = Some(*digit);
        }
        self.focus = digits.len().min(OTP_LENGTH - 1);
        digits.len()
    }

    /// Clear the focused cell, or step back and clear the previous one.
    pub fn backspace(&mut self) {
        if self.cells[self.focus].is_none() && self.focus > 0 {
            self.focus -= 1;
        }
        self.cells[self.focus] = None;
    }

    /// Empty every cell and return focus to the first.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn focus(&mut self, index: usize) {
        self.focus = index.min(OTP_LENGTH - 1);
    }

    #[must_use]
    pub fn focused(&self) -> usize {
        self.focus
    }

    /// Entered digits in order; empty cells are skipped.
    #[must_use]
    pub fn value(&self) -> String {
        self.cells.iter().flatten().collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }
}
