//! Newtype wrappers for record identifiers, so a vehicle id cannot be passed
//! where a trip id is expected.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used when the store mints a fresh identifier of this kind.
            pub const PREFIX: &'static str = $prefix;

            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Identifier of a fleet vehicle.
    VehicleId,
    "veh"
);

string_newtype!(
    /// Identifier of a trip request.
    TripId,
    "trip"
);

string_newtype!(
    /// Identifier of a user (requester or administrator).
    UserId,
    "user"
);

string_newtype!(
    /// Identifier of a trip purpose catalogue entry.
    PurposeId,
    "purp"
);

string_newtype!(
    /// Identifier of a maintenance record.
    MaintenanceId,
    "mnt"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_id_display_and_as_ref() {
        let id = TripId::new("trip-abc123");
        assert_eq!(id.to_string(), "trip-abc123");
        assert_eq!(id.as_str(), "trip-abc123");
        assert_eq!(AsRef::<str>::as_ref(&id), "trip-abc123");
    }

    #[test]
    fn vehicle_id_serializes_as_plain_string() {
        let id = VehicleId::new("veh-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"veh-1\"");
        let back: VehicleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn prefixes_are_distinct() {
        let prefixes = [
            VehicleId::PREFIX,
            TripId::PREFIX,
            UserId::PREFIX,
            PurposeId::PREFIX,
            MaintenanceId::PREFIX,
        ];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(unique.len(), prefixes.len());
    }

    #[test]
    fn compares_against_str() {
        let id = UserId::from("user-7");
        assert!(id == "user-7");
        assert_eq!(id.into_inner(), "user-7");
    }
}
