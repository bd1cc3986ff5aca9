//! Pure catalog reducer
//!
//! `apply` never performs I/O. Archive outputs that a transition drops are
//! listed in [`Transition::released`] for the caller to revoke.

use crate::event::CatalogEvent;
use crate::state::{ArchiveState, CatalogState};
use picpick_archive::OutputHandle;

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: CatalogState,
    /// Outputs no longer referenced by the state
    pub released: Vec<OutputHandle>,
}

/// Apply an event to a state
#[must_use]
pub fn apply(mut state: CatalogState, event: CatalogEvent) -> Transition {
    let mut released = Vec::new();

    match event {
        CatalogEvent::SetAddress(url) => {
            if state.url.as_deref() != Some(url.as_str()) {
                released.extend(state.archive.output());
                state.url = Some(url);
                state.items.clear();
                state.selection.clear();
                state.bad_uris.clear();
                state.archive = ArchiveState::Idle;
            }
        }
        CatalogEvent::AddRecords(records) => {
            for record in records {
                if state.bad_uris.contains(&record.uri) {
                    continue;
                }
                state.items.entry(record.uri.clone()).or_insert(record);
            }
        }
        CatalogEvent::RenameRecord { key, filename } => {
            if let Some(record) = state.items.get_mut(&key) {
                record.filename = filename;
            }
        }
        CatalogEvent::MarkBadUris(keys) => {
            for key in keys {
                state.items.shift_remove(&key);
                state.bad_uris.insert(key);
            }
        }
        CatalogEvent::SetSelection(records) => {
            released.extend(state.archive.output());
            state.selection = records;
            state.archive = ArchiveState::Idle;
        }
        CatalogEvent::SetPassword(password) => {
            state.password = password;
        }
        CatalogEvent::RequestArchive { seq } => {
            if !state.selection.is_empty() {
                released.extend(state.archive.output());
                state.archive = ArchiveState::Loading { seq };
                state.last_request = state.last_request.max(seq);
            }
        }
        CatalogEvent::ArchiveReady {
            seq,
            output,
            generated,
        } => {
            if state.archive.is_loading(seq) {
                state.archive = ArchiveState::Ready {
                    seq,
                    output,
                    generated,
                };
            } else {
                released.push(output);
            }
        }
        CatalogEvent::ArchiveAborted { seq } => {
            if state.archive.is_loading(seq) {
                state.archive = ArchiveState::Idle;
            }
        }
        CatalogEvent::ClearArchiveOutput => {
            released.extend(state.archive.output());
            state.archive = ArchiveState::Idle;
        }
    }

    Transition { state, released }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use picpick_archive::BlobStore;
    use picpick_resource::{Payload, ResourceKey, ResourceRecord, Selector};
    use pretty_assertions::assert_eq;

    fn record(uri: &str) -> ResourceRecord {
        ResourceRecord::new(
            ResourceKey::new(uri),
            uri.rsplit('/').next().unwrap_or(uri),
            Selector::from_marker("picpickdl0"),
            "html>body>img>img",
        )
    }

    fn run(events: Vec<CatalogEvent>) -> (CatalogState, Vec<OutputHandle>) {
        let mut state = CatalogState::default();
        let mut released = Vec::new();
        for event in events {
            let t = apply(state, event);
            state = t.state;
            released.extend(t.released);
        }
        (state, released)
    }

    fn ready(state: CatalogState, seq: u64, output: OutputHandle) -> Transition {
        apply(
            state,
            CatalogEvent::ArchiveReady {
                seq,
                output,
                generated: Utc::now(),
            },
        )
    }

    #[test]
    fn navigation_resets_and_same_url_is_noop() {
        let (state, _) = run(vec![
            CatalogEvent::SetAddress("https://a.example/".into()),
            CatalogEvent::AddRecords(vec![record("https://a.example/1.png")]),
            CatalogEvent::MarkBadUris(vec![ResourceKey::new("https://a.example/bad.png")]),
            CatalogEvent::SetAddress("https://a.example/".into()),
        ]);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.bad_uris.len(), 1);

        let t = apply(state, CatalogEvent::SetAddress("https://b.example/".into()));
        assert!(t.state.items.is_empty());
        assert!(t.state.selection.is_empty());
        assert!(t.state.bad_uris.is_empty());
        assert_eq!(t.state.url.as_deref(), Some("https://b.example/"));
    }

    #[test]
    fn first_seen_wins_and_payload_survives() {
        let resolved = record("https://a.example/1.png").with_payload(Payload::new(vec![1u8, 2], None));
        let mut renamed_dup = record("https://a.example/1.png");
        renamed_dup.filename = "other.png".into();

        let (state, _) = run(vec![
            CatalogEvent::AddRecords(vec![resolved.clone()]),
            CatalogEvent::AddRecords(vec![renamed_dup]),
        ]);
        assert_eq!(state.items[&resolved.uri], resolved);
    }

    #[test]
    fn bad_keys_are_not_admitted_and_evict_items() {
        let (state, _) = run(vec![
            CatalogEvent::AddRecords(vec![record("https://a.example/1.png"), record("https://a.example/2.png")]),
            CatalogEvent::MarkBadUris(vec![ResourceKey::new("https://a.example/1.png")]),
            CatalogEvent::AddRecords(vec![record("https://a.example/1.png")]),
        ]);
        let keys: Vec<_> = state.items.keys().map(ResourceKey::as_str).collect();
        assert_eq!(keys, ["https://a.example/2.png"]);
        assert!(state.bad_uris.contains(&ResourceKey::new("https://a.example/1.png")));
    }

    #[test]
    fn rename_absent_key_is_noop() {
        let (state, _) = run(vec![CatalogEvent::AddRecords(vec![record("https://a.example/1.png")])]);
        let t = apply(
            state.clone(),
            CatalogEvent::RenameRecord {
                key: ResourceKey::new("https://a.example/missing.png"),
                filename: "x.png".into(),
            },
        );
        assert_eq!(t.state, state);

        let t = apply(
            state,
            CatalogEvent::RenameRecord {
                key: ResourceKey::new("https://a.example/1.png"),
                filename: "renamed.png".into(),
            },
        );
        let record = &t.state.items[&ResourceKey::new("https://a.example/1.png")];
        assert_eq!(record.filename, "renamed.png");
        assert_eq!(record.treeinfo, "html>body>img>img");
    }

    #[test]
    fn empty_selection_request_is_noop() {
        let state = CatalogState::default();
        let t = apply(state.clone(), CatalogEvent::RequestArchive { seq: 1 });
        assert_eq!(t.state, state);
        assert!(t.state.archive.is_idle());
    }

    #[test]
    fn lifecycle_and_stale_results() {
        let blobs = BlobStore::new();
        let (state, _) = run(vec![
            CatalogEvent::SetSelection(vec![record("https://a.example/1.png")]),
            CatalogEvent::RequestArchive { seq: 1 },
            CatalogEvent::RequestArchive { seq: 2 },
        ]);
        assert!(state.archive.is_loading(2));
        assert_eq!(state.last_request, 2);

        let stale = blobs.register(vec![1u8]);
        let t = ready(state, 1, stale);
        assert_eq!(t.released, [stale]);
        assert!(t.state.archive.is_loading(2));

        let fresh = blobs.register(vec![2u8]);
        let t = ready(t.state, 2, fresh);
        assert!(t.released.is_empty());
        assert_eq!(t.state.archive.output(), Some(fresh));

        let t = apply(t.state, CatalogEvent::SetPassword("pw".into()));
        assert_eq!(t.state.archive.output(), Some(fresh));

        let t = apply(t.state, CatalogEvent::SetSelection(Vec::new()));
        assert_eq!(t.released, [fresh]);
        assert!(t.state.archive.is_idle());
    }

    #[test]
    fn selection_change_while_loading_discards_result() {
        let blobs = BlobStore::new();
        let (state, _) = run(vec![
            CatalogEvent::SetSelection(vec![record("https://a.example/1.png")]),
            CatalogEvent::RequestArchive { seq: 1 },
            CatalogEvent::SetSelection(vec![record("https://a.example/2.png")]),
        ]);
        assert!(state.archive.is_idle());
        let late = blobs.register(vec![0u8]);
        let t = ready(state, 1, late);
        assert_eq!(t.released, [late]);
        assert!(t.state.archive.is_idle());
    }

    #[test]
    fn clear_and_abort_return_to_idle() {
        let blobs = BlobStore::new();
        let output = blobs.register(vec![0u8]);
        let (state, _) = run(vec![
            CatalogEvent::SetSelection(vec![record("https://a.example/1.png")]),
            CatalogEvent::RequestArchive { seq: 1 },
        ]);
        let t = apply(state.clone(), CatalogEvent::ArchiveAborted { seq: 1 });
        assert!(t.state.archive.is_idle());

        let t = ready(state, 1, output);
        let t = apply(t.state, CatalogEvent::ClearArchiveOutput);
        assert_eq!(t.released, [output]);
        assert!(t.state.archive.is_idle());
    }

    #[test]
    fn navigation_releases_output() {
        let blobs = BlobStore::new();
        let output = blobs.register(vec![0u8]);
        let (state, _) = run(vec![
            CatalogEvent::SetAddress("https://a.example/".into()),
            CatalogEvent::SetSelection(vec![record("https://a.example/1.png")]),
            CatalogEvent::RequestArchive { seq: 1 },
        ]);
        let t = ready(state, 1, output);
        let t = apply(t.state, CatalogEvent::SetAddress("https://b.example/".into()));
        assert_eq!(t.released, [output]);
        assert!(t.state.archive.is_idle());
    }
}
