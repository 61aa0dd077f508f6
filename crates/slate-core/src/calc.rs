use tracing::debug;

/// Display value after a division by zero. Never parses as a number, which
/// keeps every subsequent `compute` a no-op until `clear`.
pub const ERROR_MARKER: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    /// Both `/` and `÷` denote division.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' | '÷' => Some(Self::Div),
            _ => None,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }
}

/// One key event on the calculator surface. Buttons and keyboard input both
/// reduce to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(char),
    Decimal,
    Operator(Op),
    Equals,
    Clear,
    Backspace,
}

/// Maps a typed character to a key event. Unknown characters produce no
/// event. Enter is handled by the input loop, not here.
pub fn map_key(ch: char) -> Option<Key> {
    match ch {
        '0'..='9' => Some(Key::Digit(ch)),
        '.' => Some(Key::Decimal),
        '=' => Some(Key::Equals),
        'c' | 'C' => Some(Key::Clear),
        '\u{8}' | '\u{7f}' => Some(Key::Backspace),
        _ => Op::from_symbol(ch).map(Key::Operator),
    }
}

/// Single-pending-operator calculator. Operands are kept as the strings the
/// user typed; numbers only exist transiently inside `compute`.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    current: String,
    previous: String,
    operator: Option<Op>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
        self.operator = None;
    }

    pub fn input_digit(&mut self, digit: char) {
        self.current.push(digit);
    }

    /// At most one decimal point per operand; extra presses are ignored.
    pub fn input_decimal(&mut self) {
        if !self.current.contains('.') {
            self.current.push('.');
        }
    }

    /// No-op without a current operand. With a prior operand already staged,
    /// evaluates it first so `2 + 3 + 4 =` chains left to right.
    pub fn set_operator(&mut self, op: Op) {
        if self.current.is_empty() {
            return;
        }
        if !self.previous.is_empty() {
            self.compute();
        }
        self.operator = Some(op);
        self.previous = std::mem::take(&mut self.current);
    }

    /// No-op unless an operator is pending and both operands parse as
    /// numbers. Division by zero replaces the display with the error marker
    /// and drops the pending state.
    pub fn compute(&mut self) {
        let Some(op) = self.operator else {
            return;
        };
        let (Ok(prev), Ok(current)) = (self.previous.parse::<f64>(), self.current.parse::<f64>())
        else {
            return;
        };

        if op == Op::Div && current == 0.0 {
            debug!("division by zero");
            self.current = ERROR_MARKER.to_string();
            self.previous.clear();
            self.operator = None;
            return;
        }

        let result = op.apply(prev, current);
        self.current = format!("{result}");
        self.previous.clear();
        self.operator = None;
    }

    /// Applies one key event. Backspace is a deliberate no-op, matching the
    /// unbound delete action on the original surface.
    pub fn press(&mut self, key: Key) {
        match key {
            Key::Digit(digit) => self.input_digit(digit),
            Key::Decimal => self.input_decimal(),
            Key::Operator(op) => self.set_operator(op),
            Key::Equals => self.compute(),
            Key::Clear => self.clear(),
            Key::Backspace => {}
        }
    }

    /// The value a display surface should show: the current operand, or `0`
    /// when nothing has been typed.
    pub fn display(&self) -> &str {
        if self.current.is_empty() {
            "0"
        } else {
            &self.current
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    pub fn operator(&self) -> Option<Op> {
        self.operator
    }
}

#[cfg(test)]
mod tests {
    use super::{Calculator, ERROR_MARKER, Key, Op, map_key};

    fn type_str(calc: &mut Calculator, input: &str) {
        for ch in input.chars() {
            if let Some(key) = map_key(ch) {
                calc.press(key);
            }
        }
    }

    #[test]
    fn at_most_one_decimal_point() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "1.2.3...4");
        assert_eq!(calc.current(), "1.234");
        assert_eq!(calc.current().matches('.').count(), 1);
    }

    #[test]
    fn six_divided_by_three_is_two() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "6");
        calc.set_operator(Op::Div);
        type_str(&mut calc, "3");
        calc.compute();

        assert_eq!(calc.current(), "2");
        assert_eq!(calc.previous(), "");
        assert_eq!(calc.operator(), None);
    }

    #[test]
    fn division_by_zero_is_terminal_until_clear() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "5/0=");
        assert_eq!(calc.display(), ERROR_MARKER);
        assert_eq!(calc.previous(), "");
        assert_eq!(calc.operator(), None);

        // Further equals presses change nothing; the marker never parses.
        type_str(&mut calc, "=");
        assert_eq!(calc.display(), ERROR_MARKER);

        calc.clear();
        assert_eq!(calc.display(), "0");
    }

    #[test]
    fn clear_resets_every_field() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "12+7");
        calc.clear();

        assert_eq!(calc.current(), "");
        assert_eq!(calc.previous(), "");
        assert_eq!(calc.operator(), None);
        assert_eq!(calc.display(), "0");
    }

    #[test]
    fn chained_operators_evaluate_left_to_right() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "2+3+4=");
        assert_eq!(calc.display(), "9");
    }

    #[test]
    fn operator_without_operand_is_ignored() {
        let mut calc = Calculator::new();
        calc.set_operator(Op::Add);
        assert_eq!(calc.operator(), None);
        assert_eq!(calc.display(), "0");
    }

    #[test]
    fn compute_without_second_operand_is_ignored() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "8*");
        calc.compute();
        assert_eq!(calc.previous(), "8");
        assert_eq!(calc.operator(), Some(Op::Mul));
        assert_eq!(calc.display(), "0");
    }

    #[test]
    fn fractional_results_render_plainly() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "5/2=");
        assert_eq!(calc.display(), "2.5");
    }

    #[test]
    fn unicode_division_sign_divides() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "9÷3=");
        assert_eq!(calc.display(), "3");
    }

    #[test]
    fn backspace_and_unknown_keys_are_noops() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "42");
        calc.press(Key::Backspace);
        assert_eq!(calc.current(), "42");
        assert_eq!(map_key('x'), None);
        assert_eq!(map_key(' '), None);
    }

    #[test]
    fn clear_key_is_case_insensitive() {
        let mut calc = Calculator::new();
        type_str(&mut calc, "31C");
        assert_eq!(calc.display(), "0");
        type_str(&mut calc, "31c");
        assert_eq!(calc.display(), "0");
    }
}
