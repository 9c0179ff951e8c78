//! A device search screen: debounced query → poller → optimistic list.

mod common;

use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use common::{device, settle, Device};
use fleetsync::{DependencyKey, Debouncer, OptimisticList, Poller};
use parking_lot::Mutex;
use tokio::time::advance;

type Backend = Arc<Mutex<Vec<Device>>>;

fn backend() -> Backend {
    Arc::new(Mutex::new(vec![
        device(1, "boiler-room gw"),
        device(2, "lobby gw"),
        device(3, "roof sensor"),
    ]))
}

fn search_poller(backend: &Backend, query: &Arc<Mutex<String>>) -> Poller<Vec<Device>> {
    let backend = Arc::clone(backend);
    let query = Arc::clone(query);
    Poller::builder(move || {
        let needle = query.lock().clone();
        let matches: Vec<Device> = backend
            .lock()
            .iter()
            .filter(|d| d.name.contains(needle.as_str()))
            .cloned()
            .collect();
        ready(Ok::<_, String>(matches))
    })
    .interval(Duration::ZERO)
    .dependencies(DependencyKey::of(""))
    .spawn()
}

#[tokio::test(start_paused = true)]
async fn typing_restarts_poller_once_per_burst() {
    let backend = backend();
    let query = Arc::new(Mutex::new(String::new()));
    let poller = Arc::new(search_poller(&backend, &query));
    settle().await;
    assert_eq!(poller.data().map(|d| d.len()), Some(3));

    let restarts = Arc::new(Mutex::new(0usize));
    let mut debouncer = Debouncer::new();
    let search = {
        let poller = Arc::clone(&poller);
        let query = Arc::clone(&query);
        let restarts = Arc::clone(&restarts);
        debouncer.wrap(
            move |text: String| {
                *query.lock() = text.clone();
                if poller.set_dependencies(DependencyKey::of(&text)) {
                    *restarts.lock() += 1;
                }
            },
            Duration::from_millis(300),
        )
    };

    for text in ["g", "gw"] {
        search.call(text.to_string());
        settle().await;
        advance(Duration::from_millis(100)).await;
        settle().await;
    }
    assert_eq!(*restarts.lock(), 0);

    advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(*restarts.lock(), 1);
    assert_eq!(
        poller.data(),
        Some(vec![device(1, "boiler-room gw"), device(2, "lobby gw")])
    );
    assert!(!poller.state().is_loading);
}

#[tokio::test(start_paused = true)]
async fn optimistic_remove_then_revalidate() {
    let backend = backend();
    let query = Arc::new(Mutex::new("gw".to_string()));
    let poller = search_poller(&backend, &query);
    settle().await;

    let list = OptimisticList::new(poller.data().unwrap_or_default());
    assert_eq!(list.items().len(), 2);

    let server = Arc::clone(&backend);
    let removed = list
        .optimistic_remove(1, move |id| {
            server.lock().retain(|d| d.id != id);
            async { Ok::<_, String>(()) }
        })
        .await;
    assert!(removed);
    assert_eq!(list.items(), vec![device(2, "lobby gw")]);

    poller.refetch().await;
    assert_eq!(poller.data(), Some(list.items()));

    // A rejected rename leaves both views on the server's copy.
    let renamed = list
        .optimistic_update(
            2,
            |d| d.name = "lobby gateway".to_string(),
            |_| async { Err::<Device, _>("read-only") },
        )
        .await;
    assert_eq!(renamed, None);
    assert!(list.mutation().is_error);
    assert_eq!(poller.data(), Some(list.items()));
}
