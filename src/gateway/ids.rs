//! Snowflake id newtypes.
//!
//! Distinct types for the five id spaces the pool touches, so a member id
//! can never be passed where a channel id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The raw snowflake value.
            #[inline]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake!(
    /// A text channel id.
    ChannelId
);
snowflake!(
    /// A category (channel grouping) id.
    CategoryId
);
snowflake!(
    /// A guild member id.
    MemberId
);
snowflake!(
    /// A message id.
    MessageId
);
snowflake!(
    /// A role id.
    RoleId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_get() {
        let id = ChannelId(123456789);
        assert_eq!(id.to_string(), "123456789");
        assert_eq!(id.get(), 123456789);
    }

    #[test]
    fn test_serde_transparent() {
        let id: MemberId = toml::from_str::<std::collections::HashMap<String, MemberId>>(
            "id = 42\n",
        )
        .unwrap()["id"];
        assert_eq!(id, MemberId(42));
    }
}
