//! Location-based access control applied to query results

use crate::identity::LocationAccess;

/// A record that belongs to exactly one location
pub trait LocationScoped {
    fn location_id(&self) -> &str;
}

/// Keep only the records the caller may see.
///
/// `All` returns the input untouched; otherwise records outside the permitted
/// set are dropped and the relative order of the rest is preserved.
pub fn filter_by_location<T: LocationScoped>(records: Vec<T>, access: &LocationAccess) -> Vec<T> {
    match access {
        LocationAccess::All => records,
        LocationAccess::Only(_) => records
            .into_iter()
            .filter(|record| access.permits(record.location_id()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Appointment {
        id: &'static str,
        location_id: &'static str,
    }

    impl LocationScoped for Appointment {
        fn location_id(&self) -> &str {
            self.location_id
        }
    }

    fn appointments() -> Vec<Appointment> {
        vec![
            Appointment {
                id: "a1",
                location_id: "loc1",
            },
            Appointment {
                id: "a2",
                location_id: "loc2",
            },
            Appointment {
                id: "a3",
                location_id: "loc1",
            },
        ]
    }

    #[test]
    fn test_only_permitted_locations_survive() {
        let access = LocationAccess::Only(vec!["loc1".to_string()]);
        let visible = filter_by_location(appointments(), &access);

        let ids: Vec<_> = visible.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
    }

    #[test]
    fn test_all_returns_records_unchanged() {
        let visible = filter_by_location(appointments(), &LocationAccess::All);
        assert_eq!(visible, appointments());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let access = LocationAccess::Only(vec!["loc2".to_string()]);
        let once = filter_by_location(appointments(), &access);
        let twice = filter_by_location(once.clone(), &access);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_access_list_hides_everything() {
        let access = LocationAccess::Only(Vec::new());
        assert!(filter_by_location(appointments(), &access).is_empty());
    }
}
