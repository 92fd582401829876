//! Property tests for the type lattice.
//!
//! Types are generated from arbitrary bitmasks, some of them function-shaped with a
//! declared return type, so the covariant return-type tracking is exercised too.

use lits::Type;
use lits::types::TypeBits;
use proptest::prelude::*;

fn arb_bits() -> impl Strategy<Value = TypeBits> {
    any::<u32>().prop_map(TypeBits::from_bits_truncate)
}

fn arb_non_empty_bits() -> impl Strategy<Value = TypeBits> {
    arb_bits().prop_filter("never", |bits| !bits.is_empty())
}

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = arb_bits().prop_map(Type::new);
    leaf.prop_recursive(2, 8, 1, |inner| {
        (arb_bits(), inner).prop_map(|(bits, return_type)| {
            if return_type.is_never() {
                Type::new(bits)
            } else {
                Type::function_returning(return_type).or(&Type::new(bits - TypeBits::FUNCTION))
            }
        })
    })
}

proptest! {
    #[test]
    fn or_is_commutative_associative_idempotent(a in arb_type(), b in arb_type(), c in arb_type()) {
        prop_assert_eq!(a.or(&b), b.or(&a));
        prop_assert_eq!(a.or(&b).or(&c), a.or(&b.or(&c)));
        prop_assert_eq!(a.or(&a), a);
    }

    #[test]
    fn and_is_commutative_associative_idempotent(a in arb_type(), b in arb_type(), c in arb_type()) {
        prop_assert_eq!(a.and(&b), b.and(&a));
        prop_assert_eq!(a.and(&b).and(&c), a.and(&b.and(&c)));
        prop_assert_eq!(a.and(&a), a);
    }

    #[test]
    fn intersection_is_a_subtype(a in arb_type(), b in arb_type()) {
        prop_assert!(a.and(&b).is(&a));
        prop_assert!(a.and(&b).is(&b));
    }

    #[test]
    fn union_is_a_supertype(a in arb_type(), b in arb_type()) {
        prop_assert!(a.is(&a.or(&b)));
    }

    #[test]
    fn exclusion_laws(a in arb_type(), b in arb_type()) {
        prop_assert!(a.exclude(&a).is_never());
        prop_assert!(a.or(&a.exclude(&b)).is(&a));
        prop_assert!(a.exclude(&b).is(&a));
    }

    #[test]
    fn subtyping_is_reflexive_and_antisymmetric(a in arb_type(), b in arb_type()) {
        prop_assert!(a.is(&a));
        if a.is(&b) && b.is(&a) {
            prop_assert!(a.equals(&b));
        }
    }

    #[test]
    fn intersects_agrees_with_and(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(a.intersects(&b), !a.and(&b).is_never());
    }

    #[test]
    fn negate_number_is_an_involution(bits in arb_bits()) {
        let t = Type::new(bits);
        prop_assert_eq!(t.negate_number().negate_number(), t);
    }

    #[test]
    fn never_is_a_subtype_of_everything(bits in arb_bits()) {
        prop_assert!(Type::NEVER.is(&Type::new(bits)));
    }

    #[test]
    fn union_names_cover_the_bits(bits in arb_non_empty_bits()) {
        let t = Type::new(bits);
        let names = t.describe();
        let covered = Type::or_all(
            names
                .split('|')
                .map(|name| Type::named(name).unwrap_or(Type::NEVER))
                .collect::<Vec<_>>()
                .iter(),
        );
        prop_assert_eq!(covered, t);
    }
}

#[test]
fn negate_number_fixes_symmetric_types() {
    assert_eq!(Type::INTEGER.negate_number(), Type::INTEGER);
    assert_eq!(Type::NUMBER.negate_number(), Type::NUMBER);
    assert_eq!(Type::POSITIVE_NUMBER.negate_number(), Type::NEGATIVE_NUMBER);
}

#[test]
fn named_constants_print_their_name() {
    let named = [
        (Type::INTEGER, "integer"),
        (Type::NUMBER, "number"),
        (Type::TRUTHY, "truthy"),
        (Type::FALSY, "falsy"),
        (Type::COLLECTION, "collection"),
        (Type::UNKNOWN, "unknown"),
        (Type::NEVER, "never"),
    ];
    for (t, name) in named {
        let text = t.to_string();
        assert!(text.starts_with(&format!("{name} <")), "{text} should name {name}");
    }
}
