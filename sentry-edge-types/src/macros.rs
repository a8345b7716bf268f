/// Implements `Serialize` and `Deserialize` through `Display` and `FromStr`.
macro_rules! impl_str_serde {
    ($type:ty) => {
        impl ::serde::ser::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::ser::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<$type, D::Error>
            where
                D: ::serde::de::Deserializer<'de>,
            {
                <String as ::serde::de::Deserialize>::deserialize(deserializer)?
                    .parse()
                    .map_err(::serde::de::Error::custom)
            }
        }
    };
}

/// Implements a `Display` and `FromStr` pair over a fixed set of string names.
macro_rules! impl_str_names {
    ($type:ident, $err:ident, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl ::std::str::FromStr for $type {
            type Err = $err;

            fn from_str(s: &str) -> Result<$type, Self::Err> {
                Ok(match s {
                    $($name => $type::$variant,)+
                    _ => return Err($err),
                })
            }
        }

        impl ::std::fmt::Display for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(match self {
                    $($type::$variant => $name,)+
                })
            }
        }
    };
}

/// Generates a fixed-size random hex identifier with parsing and serde support.
macro_rules! impl_hex_id {
    ($type:ident, $len:literal, $what:literal) => {
        #[doc = concat!("Holds the identifier for a ", $what, ".")]
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $type([u8; $len]);

        impl $type {
            #[doc = concat!("Creates a new random ", $what, " identifier.")]
            pub fn random() -> Self {
                Self(::rand::random())
            }

            #[doc = concat!("Creates a ", $what, " identifier from raw bytes.")]
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes of this identifier.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Default for $type {
            fn default() -> Self {
                Self::random()
            }
        }

        impl ::std::fmt::Display for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&::hex::encode(self.0))
            }
        }

        impl ::std::fmt::Debug for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($type), self)
            }
        }

        impl ::std::str::FromStr for $type {
            type Err = ::hex::FromHexError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let mut buf = [0; $len];
                ::hex::decode_to_slice(input, &mut buf)?;
                Ok(Self(buf))
            }
        }

        impl_str_serde!($type);
    };
}
