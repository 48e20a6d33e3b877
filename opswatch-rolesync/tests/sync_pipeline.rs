//! End-to-end role-sync behaviour against in-memory team source and store.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value;
use tempfile::TempDir;

use opswatch_rolesync::{
    pipeline, RoleMapping, RoleMappingStore, RoleSyncError, RoleSyncOptions, Team, TeamSource,
    WriteOutcome,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeSource(Vec<Team>);

impl TeamSource for FakeSource {
    fn fetch_teams(&self) -> Result<Vec<Team>, RoleSyncError> {
        Ok(self.0.clone())
    }
}

struct UnreachableSource;

impl TeamSource for UnreachableSource {
    fn fetch_teams(&self) -> Result<Vec<Team>, RoleSyncError> {
        Err(RoleSyncError::Network("Checkmarx unreachable".into()))
    }
}

#[derive(Default)]
struct FakeStore {
    mappings: RefCell<BTreeMap<String, BTreeSet<String>>>,
    roles: RefCell<HashSet<String>>,
    reject: HashSet<String>,
    mutations: RefCell<Vec<String>>,
    lookups: RefCell<usize>,
}

impl FakeStore {
    fn with_mapping(self, name: &str, users: &[&str]) -> Self {
        self.mappings.borrow_mut().insert(
            name.to_string(),
            users.iter().map(|u| u.to_string()).collect(),
        );
        self.roles.borrow_mut().insert(name.to_string());
        self
    }

    fn rejecting(mut self, name: &str) -> Self {
        self.reject.insert(name.to_string());
        self
    }

    fn users(&self, name: &str) -> Option<BTreeSet<String>> {
        self.mappings.borrow().get(name).cloned()
    }
}

impl RoleMappingStore for FakeStore {
    fn get_role_mapping(&self, name: &str) -> Result<Option<RoleMapping>, RoleSyncError> {
        *self.lookups.borrow_mut() += 1;
        Ok(self.mappings.borrow().get(name).map(|users| RoleMapping {
            enabled: true,
            roles: vec![name.to_string()],
            usernames: users.clone(),
        }))
    }

    fn put_role_mapping(&self, name: &str, body: &Value) -> Result<(), RoleSyncError> {
        self.mutations.borrow_mut().push(format!("put_role_mapping:{name}"));
        if self.reject.contains(name) {
            return Err(RoleSyncError::Api {
                service: "Elasticsearch",
                status: 400,
                url: format!("https://es.test/_security/role_mapping/{name}"),
                body: "bad request".into(),
            });
        }
        let users = body["rules"]["any"]
            .as_array()
            .expect("any rules")
            .iter()
            .map(|rule| rule["field"]["username"].as_str().expect("username").to_string())
            .collect();
        self.mappings.borrow_mut().insert(name.to_string(), users);
        Ok(())
    }

    fn role_exists(&self, name: &str) -> Result<bool, RoleSyncError> {
        Ok(self.roles.borrow().contains(name))
    }

    fn put_role(&self, name: &str, _body: &Value) -> Result<(), RoleSyncError> {
        self.mutations.borrow_mut().push(format!("put_role:{name}"));
        self.roles.borrow_mut().insert(name.to_string());
        Ok(())
    }
}

fn options(dir: &TempDir) -> RoleSyncOptions {
    RoleSyncOptions {
        error_log: dir.path().join("sync_errors.log"),
        ..RoleSyncOptions::default()
    }
}

fn set(users: &[&str]) -> BTreeSet<String> {
    users.iter().map(|u| u.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn each_distinct_team_gets_exactly_its_members() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/DIT", ["alice", "bob"]),
        Team::new("/CxServer/QA", ["carol"]),
    ]);
    let store = FakeStore::default()
        .with_mapping("DIT", &[])
        .with_mapping("QA", &["zed"]);

    let report = pipeline::run(&source, &store, &options(&dir)).unwrap();

    assert!(!report.has_failures());
    assert_eq!(store.users("DIT"), Some(set(&["alice", "bob"])));
    assert_eq!(store.users("QA"), Some(set(&["carol"])));
}

#[test]
fn existing_mapping_is_replaced_not_merged() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![Team::new("/CxServer/DIT", ["B", "C"])]);
    let store = FakeStore::default().with_mapping("DIT", &["A", "B"]);

    let report = pipeline::run(&source, &store, &options(&dir)).unwrap();

    assert_eq!(store.users("DIT"), Some(set(&["B", "C"])));
    assert_eq!(
        report.results[0].outcome,
        WriteOutcome::Updated {
            added: vec!["C".into()],
            removed: vec!["A".into()],
        }
    );
}

#[test]
fn colliding_short_names_are_excluded_and_logged_once() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/EU/Platform", ["alice"]),
        Team::new("/CxServer/US/Platform", ["bob"]),
        Team::new("/CxServer/DIT", ["carol"]),
    ]);
    let store = FakeStore::default()
        .with_mapping("Platform", &["old"])
        .with_mapping("DIT", &[]);
    let opts = options(&dir);

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(store.users("Platform"), Some(set(&["old"])));
    assert!(!store
        .mutations
        .borrow()
        .iter()
        .any(|m| m.ends_with(":Platform")));

    let log = std::fs::read_to_string(&opts.error_log).unwrap();
    let conflict_lines: Vec<_> = log.lines().filter(|l| l.contains("\"conflict\"")).collect();
    assert_eq!(conflict_lines.len(), 1);
    assert!(conflict_lines[0].contains("/CxServer/EU/Platform"));
    assert!(conflict_lines[0].contains("/CxServer/US/Platform"));
    assert!(!report.has_failures(), "conflicts are warnings, not failures");
}

#[test]
fn missing_mapping_without_create_roles_fails_that_team_only() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/Ghost", ["alice"]),
        Team::new("/CxServer/DIT", ["bob"]),
    ]);
    let store = FakeStore::default().with_mapping("DIT", &[]);
    let opts = options(&dir);

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert!(report.has_failures());
    assert!(report.results[0].outcome.is_failure());
    assert_eq!(store.users("DIT"), Some(set(&["bob"])));
    let log = std::fs::read_to_string(&opts.error_log).unwrap();
    assert!(log.contains("write_failure") && log.contains("Ghost"));
}

#[test]
fn store_rejection_does_not_abort_remaining_teams() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/Bad", ["alice"]),
        Team::new("/CxServer/Good", ["bob"]),
    ]);
    let store = FakeStore::default()
        .with_mapping("Bad", &[])
        .with_mapping("Good", &[])
        .rejecting("Bad");

    let report = pipeline::run(&source, &store, &options(&dir)).unwrap();

    assert_eq!(report.count(WriteOutcome::is_failure), 1);
    assert_eq!(store.users("Good"), Some(set(&["bob"])));
}

#[test]
fn create_roles_provisions_role_then_mapping() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![Team::new("/CxServer/NewTeam", ["alice"])]);
    let store = FakeStore::default();
    let opts = RoleSyncOptions {
        create_roles: true,
        ..options(&dir)
    };

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert_eq!(
        report.results[0].outcome,
        WriteOutcome::Created { role_created: true }
    );
    assert_eq!(
        *store.mutations.borrow(),
        vec!["put_role:NewTeam".to_string(), "put_role_mapping:NewTeam".to_string()]
    );
}

#[test]
fn create_roles_reuses_existing_role() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![Team::new("/CxServer/DIT", ["alice"])]);
    let store = FakeStore::default();
    store.roles.borrow_mut().insert("DIT".into());
    let opts = RoleSyncOptions {
        create_roles: true,
        ..options(&dir)
    };

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert_eq!(
        report.results[0].outcome,
        WriteOutcome::Created { role_created: false }
    );
    assert_eq!(*store.mutations.borrow(), vec!["put_role_mapping:DIT".to_string()]);
}

#[test]
fn dry_run_looks_up_but_never_mutates_or_logs_to_file() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/DIT", ["B", "C"]),
        Team::new("/CxServer/NewTeam", ["alice"]),
        Team::new("/CxServer/A/Dup", ["x"]),
        Team::new("/CxServer/B/Dup", ["y"]),
    ]);
    let store = FakeStore::default().with_mapping("DIT", &["A", "B"]);
    let opts = RoleSyncOptions {
        dry_run: true,
        create_roles: true,
        ..options(&dir)
    };

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert!(store.mutations.borrow().is_empty());
    assert_eq!(*store.lookups.borrow(), 2);
    assert_eq!(store.users("DIT"), Some(set(&["A", "B"])));
    assert!(!opts.error_log.exists());
    assert!(matches!(
        report.results[0].outcome,
        WriteOutcome::WouldUpdate { .. }
    ));
    assert_eq!(
        report.results[1].outcome,
        WriteOutcome::WouldCreate { role_created: true }
    );
    assert_eq!(report.conflicts.len(), 1);
}

#[test]
fn team_filter_limits_writes_and_reports_unknown_names() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![
        Team::new("/CxServer/DIT", ["alice"]),
        Team::new("/CxServer/QA", ["bob"]),
    ]);
    let store = FakeStore::default()
        .with_mapping("DIT", &[])
        .with_mapping("QA", &["keep"]);
    let opts = RoleSyncOptions {
        teams: Some(vec!["DIT".into(), "Nope".into()]),
        ..options(&dir)
    };

    let report = pipeline::run(&source, &store, &opts).unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(store.users("QA"), Some(set(&["keep"])));
    assert_eq!(report.unmatched_filters, vec!["Nope".to_string()]);
}

#[test]
fn empty_team_is_skipped_without_touching_store() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource(vec![Team::new("/CxServer/Empty", Vec::<String>::new())]);
    let store = FakeStore::default().with_mapping("Empty", &["keep"]);

    let report = pipeline::run(&source, &store, &options(&dir)).unwrap();

    assert!(matches!(report.results[0].outcome, WriteOutcome::Skipped { .. }));
    assert_eq!(store.users("Empty"), Some(set(&["keep"])));
    assert!(!report.has_failures());
}

#[test]
fn fetch_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let store = FakeStore::default();
    let err = pipeline::run(&UnreachableSource, &store, &options(&dir)).unwrap_err();
    assert!(matches!(err, RoleSyncError::Network(_)));
}
