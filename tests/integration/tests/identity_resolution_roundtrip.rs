use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use ident_resolver::{
    load_resolver_config, AddressExistence, CollaboratorError, ExternalAddressOracle,
    GateScope, IdentityResolver, InboundReference, OracleError, ResolutionPath, ResolverConfig,
    TicketTransition,
};
use ident_store::{
    ContactDirectory, ContactId, InMemoryContactDirectory, NewContact, SqliteContactDirectory,
    TenantId, TicketId, TicketStatus,
};
use tokio::sync::Mutex as AsyncMutex;

const TENANT: TenantId = TenantId(1);

struct ScriptedOracle {
    answers: HashMap<String, AddressExistence>,
    delay: Duration,
    requests: AsyncMutex<Vec<String>>,
}

impl ScriptedOracle {
    fn new(answers: &[(&str, AddressExistence)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(address, answer)| (address.to_string(), answer.clone()))
                .collect(),
            delay: Duration::ZERO,
            requests: AsyncMutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl ExternalAddressOracle for ScriptedOracle {
    async fn check_existence(
        &self,
        address: &str,
    ) -> Result<Option<AddressExistence>, OracleError> {
        self.requests.lock().await.push(address.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.answers.get(address).cloned())
    }
}

/// Records each close together with the owner the ticket had at that moment.
struct OwnershipCheckingTickets {
    directory: Arc<dyn ContactDirectory>,
    closes: AsyncMutex<Vec<(TicketId, ContactId)>>,
}

impl OwnershipCheckingTickets {
    fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            closes: AsyncMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TicketTransition for OwnershipCheckingTickets {
    async fn set_status(
        &self,
        ticket_id: TicketId,
        tenant_id: TenantId,
        status: TicketStatus,
    ) -> Result<(), CollaboratorError> {
        let ticket = self
            .directory
            .get_ticket(tenant_id, ticket_id)
            .await?
            .ok_or_else(|| CollaboratorError::Rejected(format!("ticket {ticket_id} missing")))?;
        self.closes.lock().await.push((ticket_id, ticket.contact_id));
        self.directory
            .set_ticket_status(tenant_id, ticket_id, status)
            .await?;
        Ok(())
    }
}

fn sqlite_directory(root: &Path) -> Arc<dyn ContactDirectory> {
    Arc::new(
        SqliteContactDirectory::new(root.join("state/contacts.sqlite"))
            .expect("sqlite directory should open"),
    )
}

async fn run_mapping_scenario(directory: Arc<dyn ContactDirectory>) {
    let existing = directory
        .insert_contact(NewContact::new(TENANT, "Ana", "5511999"))
        .await
        .expect("seed contact");
    let resolver = IdentityResolver::new(
        directory.clone(),
        ResolverConfig {
            fallback_profile_picture_url: Some("https://cdn.example/nopicture.png".to_string()),
            ..ResolverConfig::default()
        },
    );
    let oracle = ScriptedOracle::new(&[("5511999@s", AddressExistence::linked("abc123@lid"))]);

    let outcome = resolver
        .resolve(&InboundReference::new("5511999@s"), &oracle, TENANT)
        .await
        .expect("resolution should succeed");

    assert_eq!(outcome.contact_id(), existing.id);
    assert_eq!(outcome.path, ResolutionPath::PhoneKnown);
    assert!(outcome.merge.is_none());
    assert!(outcome.mapping_created);
    assert!(!outcome.is_degraded());
    assert_eq!(
        outcome.contact.profile_pic_url.as_deref(),
        Some("https://cdn.example/nopicture.png")
    );

    let mappings = directory.list_mappings(TENANT).await.expect("mappings");
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].lid, "abc123");
    assert_eq!(mappings[0].contact_id, existing.id);
    assert_eq!(directory.list_contacts(TENANT).await.expect("contacts").len(), 1);

    // With the mapping in place the transport is no longer consulted.
    let again = resolver
        .resolve(&InboundReference::new("5511999@s"), &oracle, TENANT)
        .await
        .expect("repeat resolution");
    assert_eq!(again.contact_id(), existing.id);
    assert_eq!(oracle.request_count().await, 1);

    let via_lid = resolver
        .resolve(&InboundReference::new("abc123@lid"), &oracle, TENANT)
        .await
        .expect("linked-identifier resolution");
    assert_eq!(via_lid.path, ResolutionPath::LinkedIdMapped);
    assert_eq!(via_lid.contact_id(), existing.id);
}

async fn run_merge_scenario(directory: Arc<dyn ContactDirectory>) {
    let phone = directory
        .insert_contact(NewContact::new(TENANT, "Phone", "5511888"))
        .await
        .expect("phone contact");
    let linked = directory
        .insert_contact(NewContact::new(TENANT, "Linked", "abc123@lid"))
        .await
        .expect("linked contact");
    for body in ["first", "second"] {
        directory
            .insert_message(TENANT, linked.id, body)
            .await
            .expect("message");
    }
    let open = directory
        .insert_ticket(TENANT, linked.id, TicketStatus::Open)
        .await
        .expect("ticket");
    let tickets = Arc::new(OwnershipCheckingTickets::new(directory.clone()));
    let resolver = IdentityResolver::new(directory.clone(), ResolverConfig::default())
        .with_ticket_transition(tickets.clone());
    let oracle = ScriptedOracle::new(&[("5511888@s", AddressExistence::linked("abc123@lid"))]);

    let outcome = resolver
        .resolve(&InboundReference::new("5511888@s"), &oracle, TENANT)
        .await
        .expect("resolution should succeed");

    assert_eq!(outcome.contact_id(), phone.id);
    let report = outcome.merge.clone().expect("merge report");
    assert_eq!(report.loser_id, linked.id);
    assert_eq!(report.messages_moved, 2);
    assert_eq!(report.tickets_closed, 1);

    // Closed while still owned by the duplicate, then moved.
    assert_eq!(*tickets.closes.lock().await, vec![(open.id, linked.id)]);
    let ticket = directory
        .get_ticket(TENANT, open.id)
        .await
        .expect("ticket lookup")
        .expect("ticket");
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert_eq!(ticket.contact_id, phone.id);

    let contacts = directory.list_contacts(TENANT).await.expect("contacts");
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, phone.id);
    assert_eq!(contacts[0].number, "5511888");
    assert_eq!(
        directory
            .list_messages(TENANT, phone.id)
            .await
            .expect("messages")
            .len(),
        2
    );
    let mapping = directory
        .find_mapping_by_lid(TENANT, "abc123")
        .await
        .expect("mapping lookup")
        .expect("mapping");
    assert_eq!(mapping.contact_id, phone.id);
}

#[tokio::test]
async fn integration_mapping_scenario_in_memory() {
    run_mapping_scenario(Arc::new(InMemoryContactDirectory::new())).await;
}

#[tokio::test]
async fn integration_mapping_scenario_sqlite() {
    let temp = tempfile::tempdir().expect("tempdir");
    run_mapping_scenario(sqlite_directory(temp.path())).await;
}

#[tokio::test]
async fn integration_merge_scenario_in_memory() {
    run_merge_scenario(Arc::new(InMemoryContactDirectory::new())).await;
}

#[tokio::test]
async fn integration_merge_scenario_sqlite() {
    let temp = tempfile::tempdir().expect("tempdir");
    run_merge_scenario(sqlite_directory(temp.path())).await;
}

#[tokio::test]
async fn integration_resolution_survives_directory_reopen() {
    let temp = tempfile::tempdir().expect("tempdir");
    let oracle = ScriptedOracle::new(&[("5511999@s", AddressExistence::linked("abc123@lid"))]);

    let first = {
        let resolver =
            IdentityResolver::new(sqlite_directory(temp.path()), ResolverConfig::default());
        resolver
            .resolve(&InboundReference::new("abc123@lid"), &oracle, TENANT)
            .await
            .expect("first resolution")
    };
    assert_eq!(first.path, ResolutionPath::Created);

    let resolver = IdentityResolver::new(sqlite_directory(temp.path()), ResolverConfig::default());
    let adopted = resolver
        .resolve(&InboundReference::new("5511999@s"), &oracle, TENANT)
        .await
        .expect("phone resolution after reopen");
    assert_eq!(adopted.path, ResolutionPath::PhoneAdoptedLinkedId);
    assert_eq!(adopted.contact_id(), first.contact_id());
    assert_eq!(adopted.contact.number, "5511999");

    let reopened = sqlite_directory(temp.path());
    let contacts = reopened.list_contacts(TENANT).await.expect("contacts");
    assert_eq!(contacts.len(), 1);
    assert_eq!(
        reopened
            .find_mapping_by_contact(TENANT, first.contact_id())
            .await
            .expect("mapping lookup")
            .map(|mapping| mapping.lid),
        Some("abc123".to_string())
    );
}

#[tokio::test]
async fn integration_concurrent_first_contact_creates_single_row() {
    let temp = tempfile::tempdir().expect("tempdir");
    let directory = sqlite_directory(temp.path());
    let resolver = Arc::new(IdentityResolver::new(
        directory.clone(),
        ResolverConfig::default(),
    ));
    let oracle = Arc::new(
        ScriptedOracle::new(&[("5511777@s", AddressExistence::missing())])
            .with_delay(Duration::from_millis(10)),
    );

    let mut handles = Vec::new();
    for _ in 0..6 {
        let resolver = resolver.clone();
        let oracle = oracle.clone();
        handles.push(tokio::spawn(async move {
            resolver
                .resolve(&InboundReference::new("5511777@s"), oracle.as_ref(), TENANT)
                .await
                .map(|outcome| outcome.contact_id())
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(
            handle
                .await
                .expect("task should join")
                .expect("resolution should succeed"),
        );
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(directory.list_contacts(TENANT).await.expect("contacts").len(), 1);
}

#[tokio::test]
async fn integration_config_file_drives_resolver() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config_path = temp.path().join("resolver.json");
    std::fs::write(
        &config_path,
        serde_json::json!({
            "schema_version": 1,
            "gate_scope": "global",
            "address_domains": { "linked_id_suffix": "@anon" }
        })
        .to_string(),
    )
    .expect("write config");
    let config = load_resolver_config(&config_path).expect("config should load");
    assert_eq!(config.gate_scope, GateScope::Global);

    let directory: Arc<dyn ContactDirectory> = Arc::new(InMemoryContactDirectory::new());
    let resolver = IdentityResolver::new(directory.clone(), config);
    let oracle = ScriptedOracle::new(&[]);

    let outcome = resolver
        .resolve(&InboundReference::new("xyz789@anon"), &oracle, TENANT)
        .await
        .expect("resolution should succeed");
    assert_eq!(outcome.path, ResolutionPath::Created);
    assert_eq!(outcome.contact.number, "xyz789@anon");
    assert_eq!(oracle.request_count().await, 0);

    let encoded = serde_json::to_value(&outcome).expect("outcome serializes");
    assert_eq!(encoded["path"], "created");
    assert_eq!(encoded["status"], "succeeded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_tenants_and_groups_share_sqlite_without_lock_errors() {
    let temp = tempfile::tempdir().expect("tempdir");
    let directory = sqlite_directory(temp.path());
    let resolver = Arc::new(IdentityResolver::new(
        directory.clone(),
        ResolverConfig::default(),
    ));
    let oracle = Arc::new(ScriptedOracle::new(&[]));
    let tenants = (1..=6).map(TenantId).collect::<Vec<_>>();
    let rounds = 10;

    for round in 0..rounds {
        let mut handles = Vec::new();
        for tenant_id in &tenants {
            let tenant_id = *tenant_id;
            let phone = format!("55{}{round:03}@s", tenant_id.get());
            for address in [phone, "1203630@g.us".to_string()] {
                let resolver = resolver.clone();
                let oracle = oracle.clone();
                handles.push(tokio::spawn(async move {
                    resolver
                        .resolve(&InboundReference::new(address), oracle.as_ref(), tenant_id)
                        .await
                }));
            }
        }
        for handle in handles {
            let outcome = handle.await.expect("task should join");
            assert!(outcome.is_ok(), "round {round}: {:?}", outcome.err());
        }
    }

    for tenant_id in tenants {
        let contacts = directory.list_contacts(tenant_id).await.expect("contacts");
        assert_eq!(contacts.len(), rounds + 1);
        assert_eq!(contacts.iter().filter(|contact| contact.is_group).count(), 1);
    }
}
