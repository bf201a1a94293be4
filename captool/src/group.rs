//! Regrouping the flat values of repeatable multi-value flags.

/// Split `flat` into consecutive groups of `arity` tokens.
///
/// A trailing partial group is dropped.
pub fn group<S>(flat: &[S], arity: usize) -> Vec<Vec<String>>
where
    S: AsRef<str>,
{
    if arity == 0 {
        return Vec::new();
    }
    flat.chunks_exact(arity)
        .map(|chunk| chunk.iter().map(|s| s.as_ref().to_owned()).collect())
        .collect()
}

/// A fixed-arity record built from raw tokens.
pub trait ArgumentGroup: Sized {
    const ARITY: usize;

    /// Build from exactly [Self::ARITY] tokens.
    fn from_tokens(tokens: Vec<String>) -> Self;
}

/// [group], then build typed records.
pub fn decode_groups<G, S>(flat: &[S]) -> Vec<G>
where
    G: ArgumentGroup,
    S: AsRef<str>,
{
    group(flat, G::ARITY)
        .into_iter()
        .map(G::from_tokens)
        .collect()
}

macro_rules! argument_group {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl ArgumentGroup for $name {
            const ARITY: usize = [$(stringify!($field)),+].len();

            fn from_tokens(tokens: Vec<String>) -> Self {
                let mut tokens = tokens.into_iter();
                Self {
                    $($field: tokens.next().unwrap_or_default(),)+
                }
            }
        }
    };
}

argument_group!(
    /// `--write-uint16` and `--write-uint32`.
    RegisterWrite { address, value }
);

argument_group!(
    /// A module and one of its channels.
    ChannelRef { module, channel }
);

argument_group!(
    /// `--set-nominal-current`.
    NominalCurrentSet { module, channel, value }
);

argument_group!(
    /// `--control-channel`.
    ChannelControl { module, channel, state }
);

argument_group!(CoilRead { address });

argument_group!(CoilWrite { address, state });
