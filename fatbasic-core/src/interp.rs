//! Interpreter seam for the file commands.
//!
//! The `Interp` trait covers the four services the bridge consumes from the
//! surrounding interpreter: string expression evaluation, token scanning,
//! statement-end checking, and line output. `ScriptedInterp` implements it
//! over queued values, so the bridge runs identically under tests and inside
//! a host shell.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{BasicError, BasicResult};

/// Accounting for string storage leased out by the expression evaluator.
///
/// The evaluator owns a bounded string arena; every value it hands to a
/// command must be returned exactly once. The pool tracks live and issued
/// leases so a harness can assert nothing leaked after an operation.
#[derive(Debug, Default)]
pub struct StrPool {
    live: AtomicUsize,
    issued: AtomicUsize,
}

impl StrPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lease a string value out of the pool.
    pub fn lease(self: &Arc<Self>, text: impl Into<String>) -> ArgStr {
        self.live.fetch_add(1, Ordering::Relaxed);
        self.issued.fetch_add(1, Ordering::Relaxed);
        ArgStr {
            text: text.into(),
            pool: Some(Arc::clone(self)),
        }
    }

    /// Number of leases currently outstanding.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Total number of leases ever issued.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::Relaxed)
    }
}

/// A string argument leased from the evaluator's string pool.
///
/// The backing storage is released exactly once, when the value drops, on
/// every exit path of the operation that acquired it.
#[derive(Debug)]
pub struct ArgStr {
    text: String,
    pool: Option<Arc<StrPool>>,
}

impl ArgStr {
    /// A free-standing value with no pool behind it.
    pub fn detached(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pool: None,
        }
    }
}

impl Deref for ArgStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ArgStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Drop for ArgStr {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.live.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Services the bridge consumes from the interpreter.
pub trait Interp {
    /// Evaluate the next expression, expecting a string result.
    fn eval_string(&mut self) -> BasicResult<ArgStr>;

    /// Pull the next significant character from the statement, if any.
    /// Used to consume the separator between two path arguments.
    fn next_char(&mut self) -> Option<char>;

    /// Verify the statement terminates here.
    fn check_end(&mut self) -> BasicResult<()>;

    /// Write one line to the program's output stream.
    fn print_line(&mut self, line: &str);
}

/// Scripted interpreter front-end - queued arguments and tokens, captured
/// output.
#[derive(Default)]
pub struct ScriptedInterp {
    args: VecDeque<String>,
    tokens: VecDeque<char>,
    unterminated: bool,
    pool: Arc<StrPool>,
    output: Vec<String>,
}

impl ScriptedInterp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a statement's argument list; a `,` token is queued
    /// between consecutive arguments.
    pub fn with_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut interp = Self::new();
        for (i, arg) in args.into_iter().enumerate() {
            if i > 0 {
                interp.push_token(',');
            }
            interp.push_arg(arg);
        }
        interp
    }

    /// Queue one string argument.
    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.args.push_back(arg.into());
    }

    /// Queue one scanner character.
    pub fn push_token(&mut self, ch: char) {
        self.tokens.push_back(ch);
    }

    /// Make `check_end` report a malformed statement tail.
    pub fn mark_unterminated(&mut self) {
        self.unterminated = true;
    }

    /// The pool backing this front-end's string leases.
    pub fn pool(&self) -> &Arc<StrPool> {
        &self.pool
    }

    /// Lines printed so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }
}

impl Interp for ScriptedInterp {
    fn eval_string(&mut self) -> BasicResult<ArgStr> {
        match self.args.pop_front() {
            Some(text) => Ok(self.pool.lease(text)),
            None => Err(BasicError::Syntax),
        }
    }

    fn next_char(&mut self) -> Option<char> {
        self.tokens.pop_front()
    }

    fn check_end(&mut self) -> BasicResult<()> {
        if self.unterminated {
            Err(BasicError::Syntax)
        } else {
            Ok(())
        }
    }

    fn print_line(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_released_on_drop() {
        let pool = StrPool::new();
        {
            let arg = pool.lease("A.TXT");
            assert_eq!(&*arg, "A.TXT");
            assert_eq!(pool.live(), 1);
        }
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.issued(), 1);
    }

    #[test]
    fn test_scripted_args_in_order() {
        let mut interp = ScriptedInterp::with_args(["OLD.DAT", "NEW.DAT"]);
        assert_eq!(&*interp.eval_string().unwrap(), "OLD.DAT");
        assert_eq!(interp.next_char(), Some(','));
        assert_eq!(&*interp.eval_string().unwrap(), "NEW.DAT");
        assert_eq!(interp.next_char(), None);
        assert!(interp.check_end().is_ok());
    }

    #[test]
    fn test_eval_past_end_is_syntax_error() {
        let mut interp = ScriptedInterp::new();
        assert_eq!(interp.eval_string().unwrap_err(), BasicError::Syntax);
    }

    #[test]
    fn test_output_capture() {
        let mut interp = ScriptedInterp::new();
        interp.print_line("0:/SAVES");
        assert_eq!(interp.output(), ["0:/SAVES"]);
    }
}
