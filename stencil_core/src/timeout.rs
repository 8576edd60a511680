use core::time::Duration;

/// Per-request override of the client's default timeout.
///
/// - `Inherit`: keep the timeout from [`ClientConfig`](crate::config::ClientConfig).
/// - `Clear`: no timeout for this request.
/// - `Set(d)`: force `d` for this request.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TimeoutOverride {
    #[default]
    Inherit,
    Clear,
    Set(Duration),
}

impl TimeoutOverride {
    #[inline]
    pub fn apply(self, inherited: Option<Duration>) -> Option<Duration> {
        match self {
            TimeoutOverride::Inherit => inherited,
            TimeoutOverride::Clear => None,
            TimeoutOverride::Set(d) => Some(d),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layering() {
        let base = Some(Duration::from_secs(30));
        assert_eq!(TimeoutOverride::Inherit.apply(base), base);
        assert_eq!(TimeoutOverride::Clear.apply(base), None);
        assert_eq!(
            TimeoutOverride::Set(Duration::from_secs(2)).apply(None),
            Some(Duration::from_secs(2))
        );
    }
}
