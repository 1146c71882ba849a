//! Property-based generators for core types.

use common::Tuple;
use proptest::prelude::*;
use types::Value;

/// Any storable scalar value, NULL included. Floating-point values are
/// drawn finite so comparisons stay total.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i8>().prop_map(Value::TinyInt),
        any::<i16>().prop_map(Value::SmallInt),
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::BigInt),
        (-1e9f64..1e9).prop_map(Value::Double),
        "[a-z]{0,12}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
    ]
}

/// A tuple of exactly `arity` arbitrary values.
pub fn arb_tuple(arity: usize) -> impl Strategy<Value = Tuple> {
    prop::collection::vec(arb_value(), arity).prop_map(Tuple::new)
}
