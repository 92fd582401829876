//! Numeric transfer functions.
//!
//! Concrete results follow IEEE-754 with JavaScript `Math` conventions (NaN propagation,
//! signed zeros, `Math.round` rounding half up). Abstract results are computed per pair
//! of atomic numeric shapes ([`NumAtom`]) and unioned.
//!
//! Finite results that round past the largest double become infinite. `pow`, `exp`,
//! `sinh` and `cosh` model this per atom; `+ - * /` add the infinity in
//! [`BinaryOp::apply`], unless a concrete operand is too small to cause it.

use super::{Num, Outcome};
use crate::Error;
use crate::types::{Type, TypeBits};

/// Adding a number of at most this magnitude keeps any finite operand finite
const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

use Sign::{Negative, Positive};

impl Sign {
    fn flip(self) -> Sign {
        match self {
            Positive => Negative,
            Negative => Positive,
        }
    }

    fn times(self, other: Sign) -> Sign {
        if self == other { Positive } else { Negative }
    }
}

/// The atomic numeric shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumAtom {
    Zero(Sign),
    /// Finite, non-zero and integral
    Integer(Sign),
    /// Finite and not integral
    NonInteger(Sign),
    Infinity(Sign),
    NaN,
}

use NumAtom::{Infinity, Integer, NaN, NonInteger, Zero};

const ATOMS: [(TypeBits, NumAtom); 9] = [
    (TypeBits::POSITIVE_ZERO, Zero(Positive)),
    (TypeBits::NEGATIVE_ZERO, Zero(Negative)),
    (TypeBits::POSITIVE_INTEGER, Integer(Positive)),
    (TypeBits::NEGATIVE_INTEGER, Integer(Negative)),
    (TypeBits::POSITIVE_NON_INTEGER, NonInteger(Positive)),
    (TypeBits::NEGATIVE_NON_INTEGER, NonInteger(Negative)),
    (TypeBits::POSITIVE_INFINITY, Infinity(Positive)),
    (TypeBits::NEGATIVE_INFINITY, Infinity(Negative)),
    (TypeBits::NAN, NaN),
];

impl NumAtom {
    /// The numeric atoms present in a type
    pub fn of_type(t: &Type) -> Vec<NumAtom> {
        ATOMS
            .iter()
            .filter(|(bits, _)| t.contains(*bits))
            .map(|(_, atom)| *atom)
            .collect()
    }

    pub fn to_type(self) -> Type {
        match self {
            Zero(s) => zero(s),
            Integer(s) => int(s),
            NonInteger(s) => frac(s),
            Infinity(s) => inf(s),
            NaN => Type::NAN,
        }
    }

    /// Sign of the atom; NaN is treated as positive and never reaches a signed case
    fn sign(self) -> Sign {
        match self {
            Zero(s) | Integer(s) | NonInteger(s) | Infinity(s) => s,
            NaN => Positive,
        }
    }

    fn negate(self) -> NumAtom {
        match self {
            Zero(s) => Zero(s.flip()),
            Integer(s) => Integer(s.flip()),
            NonInteger(s) => NonInteger(s.flip()),
            Infinity(s) => Infinity(s.flip()),
            NaN => NaN,
        }
    }

    /// Position on the number line; zeros share a rank
    fn rank(self) -> u8 {
        match self {
            Infinity(Negative) => 0,
            Integer(Negative) | NonInteger(Negative) => 1,
            Zero(_) => 2,
            Integer(Positive) | NonInteger(Positive) => 3,
            Infinity(Positive) => 4,
            NaN => u8::MAX,
        }
    }
}

fn atom_type(t: TypeBits) -> Type {
    Type::new(t)
}

fn zero(s: Sign) -> Type {
    atom_type(match s {
        Positive => TypeBits::POSITIVE_ZERO,
        Negative => TypeBits::NEGATIVE_ZERO,
    })
}

fn int(s: Sign) -> Type {
    atom_type(match s {
        Positive => TypeBits::POSITIVE_INTEGER,
        Negative => TypeBits::NEGATIVE_INTEGER,
    })
}

fn frac(s: Sign) -> Type {
    atom_type(match s {
        Positive => TypeBits::POSITIVE_NON_INTEGER,
        Negative => TypeBits::NEGATIVE_NON_INTEGER,
    })
}

fn inf(s: Sign) -> Type {
    atom_type(match s {
        Positive => TypeBits::POSITIVE_INFINITY,
        Negative => TypeBits::NEGATIVE_INFINITY,
    })
}

fn union(types: &[Type]) -> Type {
    Type::or_all(types)
}

/// Non-zero finite numbers of one sign
fn finite(s: Sign) -> Type {
    union(&[int(s), frac(s)])
}

fn both_signs(f: fn(Sign) -> Type) -> Type {
    union(&[f(Positive), f(Negative)])
}

//
// Concrete helpers with JavaScript semantics
//

/// `Math.round`: halves round towards positive infinity, sign of zero kept
pub fn js_round(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    let floor = x.floor();
    let rounded = if x - floor >= 0.5 { floor + 1.0 } else { floor };
    if rounded == 0.0 && x < 0.0 {
        -0.0
    } else {
        rounded
    }
}

/// `Math.min` for two operands: NaN wins, `-0` is below `0`
pub fn js_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() { a } else { b }
    } else if a < b {
        a
    } else {
        b
    }
}

/// `Math.max` for two operands: NaN wins, `0` is above `-0`
pub fn js_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_positive() { a } else { b }
    } else if a > b {
        a
    } else {
        b
    }
}

/// `Math.pow`, which differs from C `pow` for NaN exponents and `±1 ** ±Infinity`
pub fn js_pow(a: f64, b: f64) -> f64 {
    if b.is_nan() {
        f64::NAN
    } else if b == 0.0 {
        1.0
    } else if (a == 1.0 || a == -1.0) && b.is_infinite() {
        f64::NAN
    } else {
        a.powf(b)
    }
}

/// Floored modulo: the result takes the sign of the divisor
pub fn floored_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && !r.is_nan() && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// `Math.sign`
pub fn js_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else if x > 0.0 {
        1.0
    } else {
        -1.0
    }
}

//
// Unary operations
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Inc,
    Dec,
    Abs,
    Sign,
    Round,
    Floor,
    Ceil,
    Trunc,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log2,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
}

impl UnaryOp {
    pub fn concrete(self, x: f64) -> f64 {
        match self {
            UnaryOp::Negate => -x,
            UnaryOp::Inc => x + 1.0,
            UnaryOp::Dec => x - 1.0,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sign => js_sign(x),
            UnaryOp::Round => js_round(x),
            UnaryOp::Floor => x.floor(),
            UnaryOp::Ceil => x.ceil(),
            UnaryOp::Trunc => x.trunc(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Cbrt => x.cbrt(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Log2 => x.log2(),
            UnaryOp::Log10 => x.log10(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Asin => x.asin(),
            UnaryOp::Acos => x.acos(),
            UnaryOp::Atan => x.atan(),
            UnaryOp::Sinh => x.sinh(),
            UnaryOp::Cosh => x.cosh(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Asinh => x.asinh(),
            UnaryOp::Acosh => x.acosh(),
            UnaryOp::Atanh => x.atanh(),
        }
    }

    pub fn abstract_atom(self, atom: NumAtom) -> Type {
        if atom == NaN {
            return Type::NAN;
        }
        match self {
            UnaryOp::Negate => atom.negate().to_type(),
            UnaryOp::Inc => add_atoms(atom, Integer(Positive)),
            UnaryOp::Dec => add_atoms(atom, Integer(Negative)),
            UnaryOp::Abs => match atom {
                Zero(_) => zero(Positive),
                Integer(_) => int(Positive),
                NonInteger(_) => frac(Positive),
                Infinity(_) | NaN => inf(Positive),
            },
            UnaryOp::Sign => match atom {
                Zero(s) => zero(s),
                other => int(other.sign()),
            },
            UnaryOp::Round | UnaryOp::Floor | UnaryOp::Ceil | UnaryOp::Trunc => {
                rounding_atom(self, atom)
            }
            UnaryOp::Sqrt => match atom {
                Zero(s) => zero(s),
                Integer(Positive) | NonInteger(Positive) => finite(Positive),
                Infinity(Positive) => inf(Positive),
                _ => Type::NAN,
            },
            UnaryOp::Cbrt => match atom {
                Zero(s) => zero(s),
                Infinity(s) => inf(s),
                other => finite(other.sign()),
            },
            UnaryOp::Exp => match atom {
                Zero(_) => int(Positive),
                Infinity(Positive) => inf(Positive),
                Infinity(Negative) => zero(Positive),
                Integer(Positive) | NonInteger(Positive) => union(&[finite(Positive), inf(Positive)]),
                Integer(Negative) => union(&[frac(Positive), zero(Positive)]),
                _ => union(&[finite(Positive), zero(Positive)]),
            },
            UnaryOp::Log | UnaryOp::Log2 | UnaryOp::Log10 => match atom {
                Zero(_) => inf(Negative),
                Infinity(Positive) => inf(Positive),
                Integer(Positive) => union(&[zero(Positive), finite(Positive)]),
                NonInteger(Positive) => both_signs(finite),
                _ => Type::NAN,
            },
            UnaryOp::Sin | UnaryOp::Tan => match atom {
                Zero(s) => zero(s),
                Infinity(_) => Type::NAN,
                _ => Type::FINITE_NUMBER,
            },
            UnaryOp::Cos => match atom {
                Zero(_) => int(Positive),
                Infinity(_) => Type::NAN,
                _ => Type::FINITE_NUMBER,
            },
            UnaryOp::Asin => match atom {
                Zero(s) => zero(s),
                Integer(s) | NonInteger(s) => union(&[finite(s), Type::NAN]),
                _ => Type::NAN,
            },
            UnaryOp::Acos => match atom {
                Zero(_) => frac(Positive),
                Integer(_) => union(&[zero(Positive), frac(Positive), Type::NAN]),
                NonInteger(_) => union(&[finite(Positive), Type::NAN]),
                _ => Type::NAN,
            },
            UnaryOp::Atan => match atom {
                Zero(s) => zero(s),
                Infinity(s) => frac(s),
                other => finite(other.sign()),
            },
            UnaryOp::Sinh => match atom {
                Zero(s) => zero(s),
                Infinity(s) => inf(s),
                other => union(&[finite(other.sign()), inf(other.sign())]),
            },
            UnaryOp::Cosh => match atom {
                Zero(_) => int(Positive),
                Infinity(_) => inf(Positive),
                _ => union(&[finite(Positive), inf(Positive)]),
            },
            UnaryOp::Tanh => match atom {
                Zero(s) => zero(s),
                Infinity(s) => int(s),
                other => finite(other.sign()),
            },
            UnaryOp::Asinh => match atom {
                Zero(s) => zero(s),
                Infinity(s) => inf(s),
                other => finite(other.sign()),
            },
            UnaryOp::Acosh => match atom {
                Integer(Positive) => union(&[zero(Positive), finite(Positive)]),
                NonInteger(Positive) => union(&[finite(Positive), Type::NAN]),
                Infinity(Positive) => inf(Positive),
                _ => Type::NAN,
            },
            UnaryOp::Atanh => match atom {
                Zero(s) => zero(s),
                Integer(s) => union(&[inf(s), Type::NAN]),
                NonInteger(s) => union(&[finite(s), Type::NAN]),
                _ => Type::NAN,
            },
        }
    }

    pub fn apply(self, a: &Num) -> Num {
        match a {
            Num::Concrete(x) => Num::Concrete(self.concrete(*x)),
            Num::Abstract(t) => {
                let results: Vec<Type> = NumAtom::of_type(t)
                    .into_iter()
                    .map(|atom| self.abstract_atom(atom))
                    .collect();
                Num::Abstract(union(&results))
            }
        }
    }
}

fn rounding_atom(op: UnaryOp, atom: NumAtom) -> Type {
    match atom {
        NonInteger(Positive) => match op {
            UnaryOp::Ceil => int(Positive),
            _ => union(&[zero(Positive), int(Positive)]),
        },
        NonInteger(Negative) => match op {
            UnaryOp::Floor => int(Negative),
            _ => union(&[zero(Negative), int(Negative)]),
        },
        other => other.to_type(),
    }
}

//
// Binary operations
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Pow,
    Rem,
    Mod,
    Quot,
}

fn add_atoms(a: NumAtom, b: NumAtom) -> Type {
    match (a, b) {
        (NaN, _) | (_, NaN) => Type::NAN,
        (Infinity(s), Infinity(t)) => {
            if s == t {
                inf(s)
            } else {
                Type::NAN
            }
        }
        (Infinity(s), _) | (_, Infinity(s)) => inf(s),
        (Zero(Negative), Zero(Negative)) => zero(Negative),
        (Zero(_), Zero(_)) => zero(Positive),
        (Zero(_), x) | (x, Zero(_)) => x.to_type(),
        (Integer(s), Integer(t)) if s == t => int(s),
        (Integer(s), NonInteger(t)) | (NonInteger(t), Integer(s)) if s == t => finite(s),
        (NonInteger(s), NonInteger(t)) if s == t => finite(s),
        // Opposite signs
        (Integer(_), Integer(_)) => union(&[zero(Positive), both_signs(int)]),
        (Integer(_), NonInteger(_)) | (NonInteger(_), Integer(_)) => both_signs(finite),
        (NonInteger(_), NonInteger(_)) => union(&[zero(Positive), both_signs(finite)]),
    }
}

fn mul_atoms(a: NumAtom, b: NumAtom) -> Type {
    match (a, b) {
        (NaN, _) | (_, NaN) => Type::NAN,
        (Infinity(_), Zero(_)) | (Zero(_), Infinity(_)) => Type::NAN,
        (Infinity(s), x) | (x, Infinity(s)) => inf(s.times(x.sign())),
        (Zero(s), x) | (x, Zero(s)) => zero(s.times(x.sign())),
        (Integer(s), Integer(t)) => int(s.times(t)),
        (Integer(s), NonInteger(t)) | (NonInteger(t), Integer(s)) => finite(s.times(t)),
        // Products of small fractions may underflow to zero
        (NonInteger(s), NonInteger(t)) => union(&[zero(s.times(t)), finite(s.times(t))]),
    }
}

fn div_atoms(a: NumAtom, b: NumAtom) -> Type {
    match (a, b) {
        (NaN, _) | (_, NaN) => Type::NAN,
        (Infinity(_), Infinity(_)) | (Zero(_), Zero(_)) => Type::NAN,
        (Infinity(s), x) => inf(s.times(x.sign())),
        (Zero(s), x) => zero(s.times(x.sign())),
        (x, Infinity(t)) => zero(x.sign().times(t)),
        (x, Zero(t)) => inf(x.sign().times(t)),
        (Integer(s), Integer(t) | NonInteger(t)) => finite(s.times(t)),
        (NonInteger(s), Integer(_) | NonInteger(_)) => {
            let sign = s.times(b.sign());
            union(&[zero(sign), finite(sign)])
        }
    }
}

fn min_max_atoms(a: NumAtom, b: NumAtom, is_min: bool) -> Type {
    if a == NaN || b == NaN {
        return Type::NAN;
    }
    let (ra, rb) = (a.rank(), b.rank());
    if ra != rb {
        let a_wins = (ra < rb) == is_min;
        return if a_wins { a.to_type() } else { b.to_type() };
    }
    match (a, b) {
        (Zero(s), Zero(t)) => {
            let preferred = if is_min { Negative } else { Positive };
            if s == preferred || t == preferred {
                zero(preferred)
            } else {
                zero(preferred.flip())
            }
        }
        _ => a.to_type().or(&b.to_type()),
    }
}

/// Whether `|x|` can be below, equal to, or above one
fn magnitude_vs_one(x: NumAtom) -> (bool, bool, bool) {
    match x {
        Zero(_) => (true, false, false),
        Integer(_) => (false, true, true),
        NonInteger(_) => (true, false, true),
        Infinity(_) => (false, false, true),
        NaN => (false, false, false),
    }
}

fn pow_atoms(a: NumAtom, b: NumAtom) -> Type {
    match (a, b) {
        (_, NaN) => Type::NAN,
        (_, Zero(_)) => int(Positive),
        (NaN, _) => Type::NAN,
        (x, Infinity(t)) => {
            let (below, at, above) = magnitude_vs_one(x);
            let (for_above, for_below) = match t {
                Positive => (inf(Positive), zero(Positive)),
                Negative => (zero(Positive), inf(Positive)),
            };
            let mut parts = Vec::new();
            if below {
                parts.push(for_below);
            }
            if at {
                parts.push(Type::NAN);
            }
            if above {
                parts.push(for_above);
            }
            union(&parts)
        }
        (Zero(s), y) => {
            let odd_possible = s == Negative && matches!(y, Integer(_));
            let result = match y.sign() {
                Positive => zero,
                Negative => inf,
            };
            if odd_possible {
                both_signs(result)
            } else {
                result(Positive)
            }
        }
        (Infinity(s), y) => {
            let odd_possible = s == Negative && matches!(y, Integer(_));
            let result = match y.sign() {
                Positive => inf,
                Negative => zero,
            };
            if odd_possible {
                both_signs(result)
            } else {
                result(Positive)
            }
        }
        (x, y) => {
            if x.sign() == Negative && matches!(y, NonInteger(_)) {
                return Type::NAN;
            }
            let magnitudes: fn(Sign) -> Type = match (x, y) {
                (Integer(_), Integer(Positive)) => |s| union(&[int(s), inf(s)]),
                (Integer(_), Integer(Negative)) => |s| union(&[zero(s), finite(s)]),
                _ => |s| union(&[zero(s), finite(s), inf(s)]),
            };
            match x.sign() {
                Positive => magnitudes(Positive),
                Negative => both_signs(magnitudes),
            }
        }
    }
}

fn rem_atoms(a: NumAtom, b: NumAtom) -> Type {
    match (a, b) {
        (NaN, _) | (_, NaN) | (Infinity(_), _) | (_, Zero(_)) => Type::NAN,
        (Zero(s), _) => zero(s),
        (x, Infinity(_)) => x.to_type(),
        (Integer(s), Integer(_)) => union(&[zero(s), int(s)]),
        (NonInteger(s), Integer(_)) => frac(s),
        (x, NonInteger(_)) => union(&[zero(x.sign()), finite(x.sign())]),
    }
}

fn mod_atoms(a: NumAtom, b: NumAtom) -> Type {
    let remainders: Vec<Type> = NumAtom::of_type(&rem_atoms(a, b))
        .into_iter()
        .map(|r| match (r, b) {
            (Integer(s) | NonInteger(s), Infinity(t)) if s != t => inf(t),
            (Integer(s), Integer(t)) if s != t => int(t),
            (Integer(s) | NonInteger(s), Integer(t) | NonInteger(t)) if s != t => finite(t),
            _ => r.to_type(),
        })
        .collect();
    union(&remainders)
}

fn quot_atoms(a: NumAtom, b: NumAtom) -> Type {
    UnaryOp::Trunc
        .apply(&Num::Abstract(div_atoms(a, b)))
        .to_type()
}

impl BinaryOp {
    pub fn concrete(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Min => js_min(a, b),
            BinaryOp::Max => js_max(a, b),
            BinaryOp::Pow => js_pow(a, b),
            BinaryOp::Rem => a % b,
            BinaryOp::Mod => floored_mod(a, b),
            BinaryOp::Quot => (a / b).trunc(),
        }
    }

    pub fn abstract_atoms(self, a: NumAtom, b: NumAtom) -> Type {
        match self {
            BinaryOp::Add => add_atoms(a, b),
            // a - b is exactly a + (-b)
            BinaryOp::Sub => add_atoms(a, b.negate()),
            BinaryOp::Mul => mul_atoms(a, b),
            BinaryOp::Div => div_atoms(a, b),
            BinaryOp::Min => min_max_atoms(a, b, true),
            BinaryOp::Max => min_max_atoms(a, b, false),
            BinaryOp::Pow => pow_atoms(a, b),
            BinaryOp::Rem => rem_atoms(a, b),
            BinaryOp::Mod => mod_atoms(a, b),
            BinaryOp::Quot => quot_atoms(a, b),
        }
    }

    /// Sign of the infinity a finite result of these atoms may overflow to
    fn overflow_sign(self, a: NumAtom, b: NumAtom) -> Option<Sign> {
        match (self, a, b) {
            (BinaryOp::Add, Integer(s), Integer(t)) if s == t => Some(s),
            (BinaryOp::Sub, _, _) => BinaryOp::Add.overflow_sign(a, b.negate()),
            (BinaryOp::Mul, Integer(s), Integer(t) | NonInteger(t))
            | (BinaryOp::Mul, NonInteger(s), Integer(t)) => Some(s.times(t)),
            (BinaryOp::Div | BinaryOp::Quot, Integer(s) | NonInteger(s), NonInteger(t)) => {
                Some(s.times(t))
            }
            _ => None,
        }
    }

    /// A concrete operand of small enough magnitude keeps the result finite
    fn overflow_ruled_out(self, a: &Num, b: &Num) -> bool {
        let magnitude = |n: &Num| match n {
            Num::Concrete(x) => Some(x.abs()),
            Num::Abstract(_) => None,
        };
        match self {
            BinaryOp::Add | BinaryOp::Sub => [a, b]
                .into_iter()
                .any(|n| magnitude(n).is_some_and(|x| x <= MAX_SAFE_INTEGER)),
            BinaryOp::Mul => [a, b]
                .into_iter()
                .any(|n| magnitude(n).is_some_and(|x| x <= 1.0)),
            BinaryOp::Div | BinaryOp::Quot => magnitude(b).is_some_and(|x| x >= 1.0),
            _ => true,
        }
    }

    pub fn apply(self, a: &Num, b: &Num) -> Num {
        if let (Num::Concrete(x), Num::Concrete(y)) = (a, b) {
            return Num::Concrete(self.concrete(*x, *y));
        }
        let (a_type, b_type) = (a.to_type(), b.to_type());
        // x ** ±0 is 1 for every x, NaN included
        if self == BinaryOp::Pow && !a_type.is_never() && !b_type.is_never() && b_type.is(&Type::ZERO) {
            return Num::Concrete(1.0);
        }

        let may_overflow = !self.overflow_ruled_out(a, b);
        let b_atoms = NumAtom::of_type(&b_type);
        let mut results = Vec::new();
        for a_atom in NumAtom::of_type(&a_type) {
            for b_atom in &b_atoms {
                results.push(self.abstract_atoms(a_atom, *b_atom));
                if may_overflow && let Some(sign) = self.overflow_sign(a_atom, *b_atom) {
                    results.push(inf(sign));
                }
            }
        }
        Num::Abstract(union(&results))
    }

    /// Left fold over two or more operands
    pub fn fold(self, first: &Num, rest: &[Num]) -> Num {
        rest.iter()
            .fold(first.clone(), |acc, operand| self.apply(&acc, operand))
    }
}

/// Variadic `+`: `(+)` is 0
pub fn sum(args: &[Num]) -> Num {
    match args {
        [] => Num::Concrete(0.0),
        [first, rest @ ..] => BinaryOp::Add.fold(first, rest),
    }
}

/// Variadic `-`: `(-)` is 0 and `(- x)` negates
pub fn difference(args: &[Num]) -> Num {
    match args {
        [] => Num::Concrete(0.0),
        [only] => UnaryOp::Negate.apply(only),
        [first, rest @ ..] => BinaryOp::Sub.fold(first, rest),
    }
}

/// Variadic `*`: `(*)` is 1
pub fn product(args: &[Num]) -> Num {
    match args {
        [] => Num::Concrete(1.0),
        [first, rest @ ..] => BinaryOp::Mul.fold(first, rest),
    }
}

/// Variadic `/`: `(/ x)` is the reciprocal
pub fn quotient(args: &[Num]) -> Num {
    match args {
        [] => Num::Concrete(1.0),
        [only] => BinaryOp::Div.apply(&Num::Concrete(1.0), only),
        [first, rest @ ..] => BinaryOp::Div.fold(first, rest),
    }
}

/// `min`/`max` over at least one operand
pub fn extremum(op: BinaryOp, args: &[Num]) -> Result<Num, Error> {
    match args {
        [] => Err(Error::arity_error(crate::Arity::AtLeast(1), 0)),
        [first, rest @ ..] => Ok(op.fold(first, rest)),
    }
}

//
// Comparisons
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    pub fn concrete(self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Less => a < b,
            Comparison::LessOrEqual => a <= b,
            Comparison::Greater => a > b,
            Comparison::GreaterOrEqual => a >= b,
        }
    }

    fn abstract_atoms(self, a: NumAtom, b: NumAtom) -> Outcome {
        match self {
            Comparison::Less => less_than(a, b, false),
            Comparison::LessOrEqual => less_than(a, b, true),
            Comparison::Greater => less_than(b, a, false),
            Comparison::GreaterOrEqual => less_than(b, a, true),
        }
    }

    pub fn compare(self, a: &Num, b: &Num) -> Outcome {
        if let (Num::Concrete(x), Num::Concrete(y)) = (a, b) {
            return Outcome::from_bool(self.concrete(*x, *y));
        }
        let b_atoms = NumAtom::of_type(&b.to_type());
        let mut outcome = Outcome::default();
        for a_atom in NumAtom::of_type(&a.to_type()) {
            for b_atom in &b_atoms {
                outcome = outcome.union(self.abstract_atoms(a_atom, *b_atom));
            }
        }
        outcome
    }

    /// Every adjacent pair must satisfy the comparison
    pub fn chain(self, args: &[Num]) -> Outcome {
        args.windows(2)
            .map(|pair| self.compare(&pair[0], &pair[1]))
            .fold(Outcome::TRUE, Outcome::and)
    }
}

fn less_than(a: NumAtom, b: NumAtom, or_equal: bool) -> Outcome {
    if a == NaN || b == NaN {
        return Outcome::FALSE;
    }
    let (ra, rb) = (a.rank(), b.rank());
    if ra < rb {
        Outcome::TRUE
    } else if ra > rb {
        Outcome::FALSE
    } else {
        match a {
            // Zeros are all equal, and so are same-signed infinities
            Zero(_) | Infinity(_) => Outcome::from_bool(or_equal),
            _ => Outcome::EITHER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(t: Type) -> Num {
        Num::Abstract(t)
    }

    #[test]
    fn test_concrete_js_semantics() {
        let test_cases: Vec<(f64, f64)> = vec![
            (js_round(2.5), 3.0),
            (js_round(-2.5), -2.0),
            (js_round(0.49999999999999994), 0.0),
            (js_pow(1.0, f64::INFINITY), f64::NAN),
            (js_pow(f64::NAN, 0.0), 1.0),
            (js_pow(2.0, 10.0), 1024.0),
            (floored_mod(-3.0, 5.0), 2.0),
            (floored_mod(3.0, -5.0), -2.0),
            (floored_mod(-6.0, 3.0), -0.0),
            (js_min(1.0, f64::NAN), f64::NAN),
            (js_max(-1.0, 2.0), 2.0),
            (js_sign(-7.5), -1.0),
        ];
        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert!(
                (actual.is_nan() && expected.is_nan()) || actual == expected,
                "Test case {} failed: {actual} != {expected}",
                i + 1
            );
        }
        assert!(js_round(-0.4).is_sign_negative());
        assert!(js_min(0.0, -0.0).is_sign_negative());
        assert!(js_max(-0.0, 0.0).is_sign_positive());
    }

    #[test]
    fn test_abstract_arithmetic() {
        let test_cases = vec![
            (
                BinaryOp::Add.apply(&abs(Type::POSITIVE_INTEGER), &Num::Concrete(1.0)),
                Type::POSITIVE_INTEGER,
            ),
            (
                BinaryOp::Add.apply(&abs(Type::POSITIVE_INFINITY), &abs(Type::NEGATIVE_INFINITY)),
                Type::NAN,
            ),
            (
                BinaryOp::Sub.apply(&abs(Type::ZERO), &abs(Type::ZERO)),
                Type::ZERO,
            ),
            (
                BinaryOp::Mul.apply(&abs(Type::NEGATIVE_INTEGER), &abs(Type::NEGATIVE_INTEGER)),
                Type::POSITIVE_INTEGER.or(&Type::POSITIVE_INFINITY),
            ),
            (
                BinaryOp::Mul.apply(&abs(Type::NEGATIVE_INTEGER), &Num::Concrete(-0.5)),
                Type::POSITIVE_INTEGER.or(&Type::POSITIVE_NON_INTEGER),
            ),
            // Dividing by a subnormal overflows
            (
                BinaryOp::Div.apply(&Num::Concrete(1.0), &abs(Type::POSITIVE_NON_INTEGER)),
                Type::POSITIVE_INTEGER
                    .or(&Type::POSITIVE_NON_INTEGER)
                    .or(&Type::POSITIVE_INFINITY),
            ),
            (
                BinaryOp::Div.apply(&abs(Type::NEGATIVE_NON_INTEGER), &Num::Concrete(2.0)),
                Type::NEGATIVE_ZERO
                    .or(&Type::NEGATIVE_INTEGER)
                    .or(&Type::NEGATIVE_NON_INTEGER),
            ),
            (
                BinaryOp::Add.apply(&abs(Type::POSITIVE_INTEGER), &abs(Type::POSITIVE_INTEGER)),
                Type::POSITIVE_INTEGER.or(&Type::POSITIVE_INFINITY),
            ),
            (
                BinaryOp::Sub.apply(&abs(Type::POSITIVE_INTEGER), &abs(Type::NEGATIVE_INTEGER)),
                Type::POSITIVE_INTEGER.or(&Type::POSITIVE_INFINITY),
            ),
            (
                BinaryOp::Div.apply(&abs(Type::POSITIVE_INTEGER), &abs(Type::ZERO)),
                Type::INFINITY,
            ),
            (
                BinaryOp::Div.apply(&abs(Type::ZERO), &abs(Type::ZERO)),
                Type::NAN,
            ),
            (
                BinaryOp::Min.apply(&abs(Type::NEGATIVE_NUMBER), &abs(Type::POSITIVE_NUMBER)),
                Type::NEGATIVE_NUMBER,
            ),
            (
                UnaryOp::Abs.apply(&abs(Type::INTEGER)),
                Type::POSITIVE_ZERO.or(&Type::POSITIVE_INTEGER),
            ),
            (
                UnaryOp::Sqrt.apply(&abs(Type::NEGATIVE_INTEGER)),
                Type::NAN,
            ),
            (
                UnaryOp::Floor.apply(&abs(Type::NEGATIVE_NON_INTEGER)),
                Type::NEGATIVE_INTEGER,
            ),
            (
                BinaryOp::Pow.apply(&abs(Type::NUMBER), &abs(Type::ZERO)),
                Type::POSITIVE_INTEGER,
            ),
            (
                BinaryOp::Mod.apply(&abs(Type::INTEGER), &abs(Type::POSITIVE_INTEGER)),
                Type::ZERO.or(&Type::POSITIVE_INTEGER),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual.to_type(), *expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_zero_exponent_is_exactly_one() {
        let test_cases = vec![
            (abs(Type::NUMBER), abs(Type::ZERO)),
            (abs(Type::NAN), abs(Type::NEGATIVE_ZERO)),
            (abs(Type::INFINITY), Num::Concrete(0.0)),
        ];
        for (i, (base, exponent)) in test_cases.iter().enumerate() {
            assert_eq!(
                BinaryOp::Pow.apply(base, exponent),
                Num::Concrete(1.0),
                "Test case {} failed",
                i + 1
            );
        }
        assert_eq!(
            BinaryOp::Pow.apply(&abs(Type::NEVER), &abs(Type::ZERO)).to_type(),
            Type::NEVER
        );
    }

    #[test]
    fn test_variadic_identities() {
        assert_eq!(sum(&[]), Num::Concrete(0.0));
        assert_eq!(product(&[]), Num::Concrete(1.0));
        assert_eq!(difference(&[Num::Concrete(3.0)]), Num::Concrete(-3.0));
        assert_eq!(quotient(&[Num::Concrete(4.0)]), Num::Concrete(0.25));
        let total = sum(&[1.0, 2.0, 3.0, 4.0].map(Num::Concrete));
        assert_eq!(total, Num::Concrete(10.0));
        // -0 survives a single-operand sum
        match sum(&[Num::Concrete(-0.0)]) {
            Num::Concrete(n) => assert!(n.is_sign_negative()),
            Num::Abstract(t) => panic!("expected concrete result, got {t}"),
        }
    }

    #[test]
    fn test_comparisons() {
        let neg = abs(Type::NEGATIVE_NUMBER);
        let pos = abs(Type::POSITIVE_NUMBER);
        assert_eq!(Comparison::Less.compare(&neg, &pos), Outcome::TRUE);
        assert_eq!(Comparison::Greater.compare(&neg, &pos), Outcome::FALSE);
        assert_eq!(
            Comparison::LessOrEqual.compare(&abs(Type::ZERO), &Num::Concrete(0.0)),
            Outcome::TRUE
        );
        assert_eq!(
            Comparison::Less.compare(&abs(Type::NAN), &pos),
            Outcome::FALSE
        );
        assert_eq!(
            Comparison::Less.compare(&pos, &Num::Concrete(3.0)),
            Outcome::EITHER
        );
        assert_eq!(
            Comparison::Less.chain(&[1.0, 2.0, 3.0].map(Num::Concrete)),
            Outcome::TRUE
        );
        assert_eq!(
            Comparison::Less.chain(&[1.0, 3.0, 2.0].map(Num::Concrete)),
            Outcome::FALSE
        );
    }
}
