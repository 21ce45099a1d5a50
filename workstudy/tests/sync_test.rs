use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use workstudy::{
    model::{Application, ApplicationStatus, Job, Record, TableName},
    persistence::{MemoryBackend, PersistenceAdapter},
    portal::{NewApplication, Portal},
    projection::{search, StatusFilter},
    ChangeHub, Store,
};

// Two view contexts (think browser tabs) over one durable backing and one hub.
fn two_contexts() -> (MemoryBackend, Arc<Store>, Arc<Store>) {
    let backend = MemoryBackend::new();
    let hub = ChangeHub::new();
    let a = Store::new(PersistenceAdapter::new(backend.clone()), hub.clone());
    let b = Store::new(PersistenceAdapter::new(backend.clone()), hub);
    (backend, Arc::new(a), Arc::new(b))
}

fn application(id: &str, job_id: &str, title: &str) -> Application {
    Application {
        id: id.to_string(),
        job_id: job_id.to_string(),
        job_title: title.to_string(),
        student_id: "u-student".to_string(),
        student_name: "Demo Student".to_string(),
        applied_at: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        status: ApplicationStatus::Pending,
    }
}

#[test]
fn empty_durable_state_loads_seed_jobs() {
    let (_, store, _) = two_contexts();
    let jobs = store.load::<Job>();
    assert_eq!(jobs.len(), 3);
    let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Library Assistant", "Research Assistant", "Lab Technician"]
    );
    assert_eq!(jobs, Job::seed());
}

#[test]
fn subscriber_sees_replaced_state() {
    let (_, store, _) = two_contexts();
    let app1 = application("app1", "j1", "Library Assistant");
    let app2 = application("app2", "j2", "Research Assistant");

    let seen: Arc<Mutex<Vec<Vec<Application>>>> = Arc::new(Mutex::new(vec![]));
    let _sub = {
        let seen = seen.clone();
        let reader = store.clone();
        store.hub().subscribe(&[TableName::Applications], move |_| {
            seen.lock().unwrap().push(reader.get::<Application>());
        })
    };

    store.replace(vec![app1.clone(), app2.clone()]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], vec![app1, app2]);
}

#[test]
fn subscriber_in_other_context_sees_durable_state() {
    let (_, a, b) = two_contexts();
    let seen = Arc::new(Mutex::new(None));
    let _sub = {
        let seen = seen.clone();
        let b2 = b.clone();
        b.hub().subscribe(&[TableName::Jobs], move |change| {
            b2.reload(change);
            *seen.lock().unwrap() = Some(b2.get::<Job>());
        })
    };

    let mut jobs = Job::seed();
    jobs.truncate(1);
    a.replace(jobs.clone());
    assert_eq!(seen.lock().unwrap().clone(), Some(jobs));
}

#[test]
fn unsubscribe_twice_stops_callbacks() {
    let (_, store, _) = two_contexts();
    let calls = Arc::new(AtomicUsize::new(0));
    let sub = {
        let calls = calls.clone();
        store.hub().subscribe(&[TableName::Jobs], move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    store.replace(Job::seed());
    sub.unsubscribe();
    sub.unsubscribe();
    store.replace::<Job>(vec![]);
    store.hub().notify_local();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn deleting_a_job_keeps_application_snapshot() {
    let (_, store, _) = two_contexts();
    store.load_all();
    let portal = Portal::new(store.clone());

    let app = portal
        .apply(NewApplication {
            job_id: "j1".to_string(),
            student_id: "u-student".to_string(),
            student_name: Some("Demo Student".to_string()),
        })
        .unwrap();
    assert_eq!(app.job_title, "Library Assistant");

    assert!(portal.delete_job("j1"));
    assert!(portal.jobs().iter().all(|j| j.id != "j1"));

    let kept = portal
        .applications()
        .into_iter()
        .find(|a| a.id == app.id)
        .unwrap();
    assert_eq!(kept.job_id, "j1");
    assert_eq!(kept.job_title, "Library Assistant");
}

#[test]
fn stale_context_overwrites_newer_write() {
    let (backend, a, b) = two_contexts();
    a.load::<Job>();
    b.load::<Job>();

    let mut from_a = a.get::<Job>();
    from_a.remove(0);
    a.replace(from_a);

    // b never reloaded, so its list still has j1
    let mut from_b = b.get::<Job>();
    from_b[1].title = "Senior Research Assistant".to_string();
    b.replace(from_b.clone());

    let durable: Vec<Job> =
        PersistenceAdapter::new(backend).load(TableName::Jobs, Vec::new());
    assert_eq!(durable, from_b);
    assert_eq!(durable.len(), 3);
}

#[test]
fn search_finds_library_only() {
    let jobs: Vec<Job> = Job::seed()
        .into_iter()
        .filter(|j| j.title.ends_with("Assistant"))
        .collect();
    let hits = search(&jobs, "library", StatusFilter::All);
    assert_eq!(hits, vec![jobs[0].clone()]);
    assert_eq!(hits[0].id(), "j1");
}
