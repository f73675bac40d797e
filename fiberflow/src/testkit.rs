//! Parameter fixtures shared by the unit tests.

use crate::ParameterStore;

pub(crate) const SINGLE_GRADE: &str = include_str!("../data/single_grade.json");
pub(crate) const TWO_GRADE: &str = include_str!("../data/two_grade.json");

/// One fiber, one pulp, two products; every cost and yield is 1.
pub(crate) fn single_grade() -> ParameterStore {
    ParameterStore::from_json_str(SINGLE_GRADE).expect("single_grade fixture")
}

/// Two recovered fibers, one virgin fiber, a floating and a pinned product.
pub(crate) fn two_grade() -> ParameterStore {
    ParameterStore::from_json_str(TWO_GRADE).expect("two_grade fixture")
}

pub(crate) fn products(params: &ParameterStore) -> Vec<String> {
    params.product_names()
}
