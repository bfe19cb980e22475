//! Permission specifications: octal (`"644"`, `0o644`) or symbolic
//! (`"a=rX,u+w"`).
use std::fmt;

use super::ResourceError;

const USER: u32 = 0o4700;
const GROUP: u32 = 0o2070;
const OTHER: u32 = 0o1007;
const ALL: u32 = 0o7777;

/// A permission specification, resolved against a path's current mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSpec {
    /// Absolute permission bits.
    Numeric(u32),
    /// Symbolic clauses in `chmod(1)` syntax.
    Symbolic(String),
}

impl ModeSpec {
    /// Parse a mode string. All-octal-digit strings are numeric; anything
    /// else is checked as symbolic.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidMode`] for malformed specifications.
    ///
    /// # Examples
    ///
    /// ```
    /// use uplaybook::resources::mode::ModeSpec;
    ///
    /// assert_eq!(ModeSpec::parse("755").unwrap(), ModeSpec::Numeric(0o755));
    /// let sym = ModeSpec::parse("a=rX,u+w").unwrap();
    /// assert_eq!(sym.resolve(0, true).unwrap(), 0o755);
    /// assert_eq!(sym.resolve(0, false).unwrap(), 0o644);
    /// ```
    pub fn parse(spec: &str) -> Result<Self, ResourceError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(invalid(spec, "empty mode"));
        }
        if spec.chars().all(|c| ('0'..='7').contains(&c)) {
            let bits = u32::from_str_radix(spec, 8).map_err(|e| invalid(spec, &e.to_string()))?;
            if bits > ALL {
                return Err(invalid(spec, "out of range"));
            }
            return Ok(Self::Numeric(bits));
        }
        apply_symbolic(spec, 0, false)?;
        Ok(Self::Symbolic(spec.to_string()))
    }

    /// Compute the resulting permission bits for a path whose current
    /// permission bits are `current`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidMode`] for malformed symbolic modes.
    pub fn resolve(&self, current: u32, is_dir: bool) -> Result<u32, ResourceError> {
        match self {
            Self::Numeric(bits) => Ok(*bits),
            Self::Symbolic(spec) => apply_symbolic(spec, current & ALL, is_dir),
        }
    }
}

impl fmt::Display for ModeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(bits) => write!(f, "{bits:o}"),
            Self::Symbolic(spec) => f.write_str(spec),
        }
    }
}

fn invalid(spec: &str, reason: &str) -> ResourceError {
    ResourceError::InvalidMode {
        mode: spec.to_string(),
        reason: reason.to_string(),
    }
}

/// Permission bits of one class (`u`, `g` or `o`) replicated to all classes.
const fn copy_class(mode: u32, class: char) -> u32 {
    let bits = match class {
        'u' => (mode >> 6) & 0o7,
        'g' => (mode >> 3) & 0o7,
        _ => mode & 0o7,
    };
    bits * 0o111
}

fn apply_symbolic(spec: &str, current: u32, is_dir: bool) -> Result<u32, ResourceError> {
    let mut mode = current;
    for clause in spec.split(',') {
        let mut chars = clause.chars().peekable();

        let mut who = 0;
        while let Some(&c) = chars.peek() {
            who |= match c {
                'u' => USER,
                'g' => GROUP,
                'o' => OTHER,
                'a' => ALL,
                _ => break,
            };
            chars.next();
        }
        if who == 0 {
            who = ALL;
        }

        let mut saw_op = false;
        while let Some(op) = chars.next() {
            if !matches!(op, '+' | '-' | '=') {
                return Err(invalid(spec, &format!("unexpected '{op}', expected one of +, -, =")));
            }
            saw_op = true;

            let mut perms = 0;
            while let Some(&c) = chars.peek() {
                perms |= match c {
                    'r' => 0o444,
                    'w' => 0o222,
                    'x' => 0o111,
                    'X' if is_dir || mode & 0o111 != 0 => 0o111,
                    'X' => 0,
                    's' => 0o6000,
                    't' => 0o1000,
                    'u' | 'g' | 'o' => copy_class(mode, c),
                    '+' | '-' | '=' => break,
                    other => return Err(invalid(spec, &format!("unknown permission '{other}'"))),
                };
                chars.next();
            }

            let bits = perms & who;
            mode = match op {
                '+' => mode | bits,
                '-' => mode & !bits,
                _ => (mode & !who) | bits,
            };
        }
        if !saw_op {
            return Err(invalid(spec, &format!("clause '{clause}' has no operator")));
        }
    }
    Ok(mode)
}
