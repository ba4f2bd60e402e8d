//! Offline smoke run: drives the engine against the in-memory transport and
//! prints the ordered list after each reconciliation step.

mod logging;

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::info;

use threadlist_core::{ChatEvent, Conversation, MessageSummary};
use threadlist_runtime::{
    spawn_engine, EngineCommand, EngineUpdate, InMemoryTransport, RuntimeConfig, UpdateStream,
};

const LOCAL_USER: i64 = 1000;
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    logging::init();

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Bad configuration: {err}");
            std::process::exit(1);
        }
    };

    let transport = Arc::new(InMemoryTransport::new(seed_conversations()));
    let handle = spawn_engine(Arc::clone(&transport), LOCAL_USER, config);
    let mut updates = handle.subscribe();

    info!("refreshing");
    if let Err(err) = handle.send(EngineCommand::Refresh).await {
        eprintln!("Engine unavailable: {err}");
        std::process::exit(1);
    }
    print_snapshot("after refresh", next_list_changed(&mut updates).await);

    info!("pinning thread 3");
    let _ = handle.send(EngineCommand::Pin(3)).await;
    print_snapshot("after pin", next_list_changed(&mut updates).await);

    info!("pushing a new message on thread 2");
    transport.push_event(ChatEvent::NewMessage {
        conversation_id: 2,
        message: MessageSummary {
            id: 900,
            text: "fresh arrival".to_owned(),
            sender_id: 2001,
            time: 5_000,
        },
    });
    print_snapshot("after new message", next_list_changed(&mut updates).await);

    info!("archiving thread 1");
    let _ = handle.send(EngineCommand::Archive(1)).await;
    loop {
        let (active, archived) = next_partitions(&mut updates).await;
        if archived.iter().any(|c| c.id == 1) {
            print_partition("after archive (active)", &active);
            print_partition("after archive (archived)", &archived);
            break;
        }
    }

    handle.shutdown().await;
}

fn seed_conversations() -> Vec<Conversation> {
    let mk = |id: i64, title: &str, time: u64, pinned: bool| Conversation {
        id,
        title: title.to_owned(),
        time,
        pinned,
        ..Conversation::default()
    };
    vec![
        mk(1, "team standup", 4_000, false),
        mk(2, "alice", 1_000, false),
        mk(3, "weekend plans", 2_000, false),
        mk(4, "announcements", 3_000, true),
    ]
}

async fn next_list_changed(updates: &mut UpdateStream) -> Vec<Conversation> {
    let (active, _) = next_partitions(updates).await;
    active
}

async fn next_partitions(updates: &mut UpdateStream) -> (Vec<Conversation>, Vec<Conversation>) {
    loop {
        let update = match timeout(STEP_TIMEOUT, updates.recv()).await {
            Ok(Ok(update)) => update,
            Ok(Err(_)) | Err(_) => {
                eprintln!("Engine stopped producing updates");
                std::process::exit(1);
            }
        };
        if let EngineUpdate::ListChanged { active, archived } = update {
            return (active, archived);
        }
    }
}

fn print_snapshot(label: &str, active: Vec<Conversation>) {
    print_partition(label, &active);
}

fn print_partition(label: &str, items: &[Conversation]) {
    println!("{label}:");
    for item in items {
        println!(
            "  [{}] {:<16} time={} pinned={} unread={}",
            item.id, item.title, item.time, item.pinned, item.unread_count
        );
    }
}
