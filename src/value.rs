use crate::{CmpOp, Value};
use core::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Canonical float for equality, hashing and total ordering: `-0.0` is `0.0`
/// and every NaN is the same NaN.
fn canonical(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

// 2^63, exactly representable
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact comparison of an integer with a float, without rounding the integer.
/// `None` only for NaN.
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        None
    } else if f >= I64_BOUND {
        Some(Ordering::Less)
    } else if f < -I64_BOUND {
        Some(Ordering::Greater)
    } else {
        let whole = f.trunc();
        // in range, so the cast is exact
        let by_fraction = if f > whole {
            Ordering::Less
        } else if f < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        };
        Some(i.cmp(&(whole as i64)).then(by_fraction))
    }
}

/// The integer a float is equal to, if any.
fn as_int(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then(|| f as i64)
}

impl Value {
    pub fn str(s: &str) -> Self {
        Self::Str(s.into())
    }
    pub fn keyword(s: &str) -> Self {
        Self::Keyword(s.into())
    }
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::Keyword(_) => "keyword",
        }
    }
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Str(_) => 3,
            Self::Keyword(_) => 4,
        }
    }

    /// Ordering used by comparison constraints. Numbers compare numerically across
    /// int and float; values of unrelated types are incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) | (Self::Keyword(a), Self::Keyword(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl CmpOp {
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        Some(match lexeme {
            "=" | "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
    /// Incomparable operands (`None`) satisfy only `!=`.
    pub fn test(self, ordering: Option<Ordering>) -> bool {
        use Ordering::*;
        match (self, ordering) {
            (Self::Ne, ordering) => ordering != Some(Equal),
            (_, None) => false,
            (Self::Eq, Some(o)) => o == Equal,
            (Self::Lt, Some(o)) => o == Less,
            (Self::Le, Some(o)) => o != Greater,
            (Self::Gt, Some(o)) => o == Greater,
            (Self::Ge, Some(o)) => o != Less,
        }
    }
}

/// Numbers are equal by value across int and float, so `1` and `1.0` are the
/// same constant. Other types only equal themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => as_int(*f) == Some(*i),
            (Self::Float(a), Self::Float(b)) => canonical(*a).to_bits() == canonical(*b).to_bits(),
            (Self::Str(a), Self::Str(b)) | (Self::Keyword(a), Self::Keyword(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Int(i) => i.hash(state),
            // integral floats hash like the integer they equal
            Self::Float(f) => match as_int(*f) {
                Some(i) => i.hash(state),
                None => canonical(*f).to_bits().hash(state),
            },
            Self::Str(s) | Self::Keyword(s) => s.hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Null => {}
        }
    }
}

/// Total order for sorted output: by type first, then by content. Numbers
/// interleave by value, with NaN after every other number.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b).unwrap_or(Ordering::Less),
            (Self::Float(a), Self::Int(b)) => {
                cmp_int_float(*b, *a).map_or(Ordering::Greater, Ordering::reverse)
            }
            (Self::Float(a), Self::Float(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Self::Str(a), Self::Str(b)) | (Self::Keyword(a), Self::Keyword(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_is_type_aware() {
        assert_ne!(Value::str("1"), Value::Int(1));
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::str("a"), Value::keyword("a"));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn numbers_are_equal_across_int_and_float() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Float(-0.0), Value::Int(0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_eq!(hash_of(&Value::Int(1)), hash_of(&Value::Float(1.0)));
        assert_eq!(hash_of(&Value::Int(0)), hash_of(&Value::Float(-0.0)));
        assert_eq!(Value::Int(1).cmp(&Value::Float(1.0)), Ordering::Equal);
        assert_eq!(Value::Float(1.5).cmp(&Value::Int(2)), Ordering::Less);
        assert_eq!(Value::Int(i64::MAX).cmp(&Value::Float(f64::NAN)), Ordering::Less);
        assert_eq!(Value::Float(f64::INFINITY).cmp(&Value::Int(i64::MAX)), Ordering::Greater);
    }

    #[test]
    fn large_integers_are_not_rounded() {
        let big = Value::Int(9_007_199_254_740_993);
        let near = Value::Float(9_007_199_254_740_992.0);
        assert_ne!(big, near);
        assert_eq!(big.compare(&near), Some(Ordering::Greater));
        assert_eq!(Value::Int(i64::MAX).compare(&Value::Float(I64_BOUND)), Some(Ordering::Less));
        assert_eq!(Value::Int(i64::MIN), Value::Float(-I64_BOUND));
        assert_eq!(Value::Int(-3).compare(&Value::Float(-2.5)), Some(Ordering::Less));
        assert_eq!(Value::Int(-2).compare(&Value::Float(-2.5)), Some(Ordering::Greater));
    }

    #[test]
    fn compare_follows_host_semantics() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.0)), Some(Ordering::Equal));
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        assert_eq!(Value::str("a").compare(&Value::str("b")), Some(Ordering::Less));
        assert_eq!(Value::Bool(false).compare(&Value::Bool(true)), Some(Ordering::Less));
        assert_eq!(Value::str("1").compare(&Value::Int(1)), None);
    }

    #[test]
    fn incomparable_operands_only_satisfy_ne() {
        for op in [CmpOp::Eq, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge] {
            assert!(!op.test(None), "{op:?}");
        }
        assert!(CmpOp::Ne.test(None));
    }

    #[test]
    fn operator_lexemes() {
        assert_eq!(CmpOp::from_lexeme("=="), Some(CmpOp::Eq));
        assert_eq!(CmpOp::from_lexeme(">="), Some(CmpOp::Ge));
        assert_eq!(CmpOp::from_lexeme("=>"), None);
        assert_eq!(CmpOp::from_lexeme("<>"), None);
    }
}
