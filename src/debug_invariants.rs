//! Consistency rules of catalog values.
//!
//! Time extents, dataset rows and relation graphs each know the rules a
//! mutation must preserve: an extent never ends before it starts, a
//! dataset's extent and granularity share its temporal type, and every
//! relation entry has its mirror on the other side. The rules are checked
//! in debug builds and with the `check-invariants` or `strict-invariants`
//! feature; other builds skip them.

use crate::catalog_error::CatalogError;

/// Whether [`debug_invariants!`](crate::debug_invariants) checks anything
/// in this build.
pub const CHECKS_ENABLED: bool = cfg!(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
));

/// A catalog value that can check its own consistency rules.
pub trait DebugInvariants {
    /// Panic on the first broken rule when checks are enabled.
    fn debug_assert_invariants(&self);

    /// The first broken rule, as the error the catalog reports for it.
    fn validate_invariants(&self) -> Result<(), CatalogError>;
}

/// First broken rule among `values`, in iteration order.
pub fn validate_all<'a, T, I>(values: I) -> Result<(), CatalogError>
where
    T: DebugInvariants + 'a,
    I: IntoIterator<Item = &'a T>,
{
    values.into_iter().try_for_each(|v| v.validate_invariants())
}

/// Evaluate a consistency check when checks are enabled and panic with the
/// broken rule. The trailing arguments format the name of the value.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $($what:tt)+) => {
        if $crate::debug_invariants::CHECKS_ENABLED {
            if let Err(e) = $check {
                panic!("inconsistent {}: {}", format_args!($($what)+), e);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::extent::TimeExtent;
    use crate::time::point::RelativeUnit;

    fn days(s: i64, e: i64) -> TimeExtent {
        TimeExtent::relative(s, Some(e), RelativeUnit::Days).unwrap()
    }

    #[test]
    fn validate_all_accepts_consistent_extents() {
        assert!(validate_all(&[days(0, 1), days(1, 3)]).is_ok());
        assert!(validate_all(std::iter::empty::<&TimeExtent>()).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "inconsistent dataset <x@y>")]
    fn macro_names_the_value() {
        crate::debug_invariants!(
            Err::<(), _>(CatalogError::InvalidExtent("bad".into())),
            "dataset <{}>",
            "x@y"
        );
    }
}
