//! Default item shape for data events without a transform.

/// Arguments of one data event, as buffered when no transform is configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Emission<A> {
    /// The event carried exactly one argument.
    Single(A),
    /// The event carried zero or several arguments.
    Multiple(Vec<A>),
}

impl<A: Clone> Emission<A> {
    pub fn from_args(args: &[A]) -> Self {
        match args {
            [single] => Self::Single(single.clone()),
            _ => Self::Multiple(args.to_vec()),
        }
    }
}

impl<A> Emission<A> {
    /// Returns the value of a single-argument emission.
    pub fn into_single(self) -> Option<A> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(_) => None,
        }
    }

    /// Returns all arguments, in emission order.
    pub fn into_vec(self) -> Vec<A> {
        match self {
            Self::Single(value) => vec![value],
            Self::Multiple(values) => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_decides_shape() {
        assert_eq!(Emission::from_args(&[5]), Emission::Single(5));
        assert_eq!(Emission::from_args(&[1, 2]), Emission::Multiple(vec![1, 2]));
        assert_eq!(Emission::<u8>::from_args(&[]), Emission::Multiple(vec![]));
    }

    #[test]
    fn accessors() {
        assert_eq!(Emission::Single("a").into_single(), Some("a"));
        assert_eq!(Emission::Multiple(vec!["a", "b"]).into_single(), None);
        assert_eq!(Emission::Single(1).into_vec(), vec![1]);
    }
}
