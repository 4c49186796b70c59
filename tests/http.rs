use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct CardView {
    id: Value,
    title: String,
    completions: u32,
    completed: bool,
    percent: u8,
    editing: bool,
    x: i32,
    y: i32,
}

impl CardView {
    fn path(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
    email: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CardsResponse {
    user: Option<SessionUser>,
    cards: Vec<CardView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    user: SessionUser,
    password_strength: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    card: CardView,
    celebrate: bool,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_path(label: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("habit_tracker_{label}_{}_{}", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

fn unique_email() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("user{nanos}@example.com")
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/session")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_habit_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", format!("{}.json", unique_path("documents")))
        .env("APP_DEVICE_DIR", unique_path("device"))
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

/// Every test starts signed out and clear of the global add/delete windows.
async fn fresh_start(client: &Client, base: &str) {
    let response = client
        .post(format!("{base}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    sleep(Duration::from_millis(1100)).await;
}

async fn add_titled_card(client: &Client, base: &str, title: &str) -> CardView {
    let added = client.post(format!("{base}/api/cards")).send().await.unwrap();
    assert_eq!(added.status(), StatusCode::CREATED);
    let added: CardView = added.json().await.unwrap();
    assert!(added.editing);
    assert_eq!(added.title, "");

    let draft = client
        .patch(format!("{base}/api/cards/{}/draft", added.path()))
        .json(&json!({ "title": title, "details": "every day" }))
        .send()
        .await
        .unwrap();
    assert!(draft.status().is_success());
    let draft: Value = draft.json().await.unwrap();
    assert_eq!(draft["title"], json!(title));
    assert_eq!(draft["showAdvanced"], json!(false));
    assert!(draft.get("show_advanced").is_none());

    let saved = client
        .post(format!("{base}/api/cards/{}/save", added.path()))
        .send()
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::OK);
    saved.json().await.unwrap()
}

async fn list(client: &Client, base: &str) -> CardsResponse {
    client
        .get(format!("{base}/api/cards"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_guest_card_lifecycle() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let card = add_titled_card(&client, base, "Stretch").await;
    assert_eq!(card.title, "Stretch");
    assert!(!card.editing);
    assert_eq!(card.percent, 0);
    assert!(card.id.is_number());

    let completion: CompletionResponse = client
        .post(format!("{base}/api/cards/{}/complete", card.path()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(completion.card.completions, 1);
    assert_eq!(completion.card.percent, 100);
    assert!(completion.card.completed);
    assert!(!completion.celebrate);

    let again = client
        .post(format!("{base}/api/cards/{}/complete", card.path()))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);

    let restarted: CardView = client
        .post(format!("{base}/api/cards/{}/restart", card.path()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(restarted.completions, 0);
    assert!(!restarted.completed);

    let listed = list(&client, base).await;
    assert!(listed.user.is_none());
    assert!(listed.cards.iter().any(|c| c.id == card.id));

    let deleted = client
        .delete(format!("{base}/api/cards/{}", card.path()))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let listed = list(&client, base).await;
    assert!(listed.cards.iter().all(|c| c.id != card.id));
}

#[tokio::test]
async fn http_completion_requires_title() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let added: CardView = client
        .post(format!("{base}/api/cards"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = client
        .post(format!("{base}/api/cards/{}/complete", added.path()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = response.text().await.unwrap();
    assert!(message.contains("add a title"));

    let cancelled: Value = client
        .post(format!("{base}/api/cards/{}/cancel", added.path()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled["removed"], json!(true));
}

#[tokio::test]
async fn http_drag_commits_offset_on_release() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let card = add_titled_card(&client, base, "Walk").await;
    let drag = |phase: &'static str, x: f64, y: f64| {
        client
            .post(format!("{base}/api/cards/{}/drag", card.path()))
            .json(&json!({ "phase": phase, "x": x, "y": y }))
            .send()
    };
    assert!(drag("start", 100.0, 100.0).await.unwrap().status().is_success());
    let moved: Value = drag("move", 110.0, 95.0).await.unwrap().json().await.unwrap();
    assert_eq!(moved["committed"], json!(false));
    let released: Value = drag("end", 130.4, 80.0).await.unwrap().json().await.unwrap();
    assert_eq!(released["committed"], json!(true));
    assert_eq!(released["offset"], json!({ "x": 30, "y": -20 }));

    let listed = list(&client, base).await;
    let stored = listed.cards.iter().find(|c| c.id == card.id).unwrap();
    assert_eq!((stored.x, stored.y), (30, -20));
}

#[tokio::test]
async fn http_unknown_card_and_missing_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let missing = client
        .post(format!("{base}/api/cards/does-not-exist/edit"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let prefs = client
        .get(format!("{base}/api/preferences"))
        .send()
        .await
        .unwrap();
    assert_eq!(prefs.status(), StatusCode::UNAUTHORIZED);

    let goals = client
        .post(format!("{base}/api/goals"))
        .json(&json!({ "title": "Run" }))
        .send()
        .await
        .unwrap();
    assert_eq!(goals.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_register_validates_input() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let response = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": "Sam",
            "email": unique_email(),
            "password": "secret1",
            "confirmPassword": "secret2",
            "agreedToTerms": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let nameless = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": " ",
            "email": unique_email(),
            "password": "secret1",
            "confirmPassword": "secret1",
            "agreedToTerms": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);

    let login = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": unique_email(), "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_signed_in_cards_follow_the_account() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let base = &server.base_url;
    let client = Client::new();
    fresh_start(&client, base).await;

    let email = unique_email();
    let registered: RegisterResponse = client
        .post(format!("{base}/api/auth/register"))
        .json(&json!({
            "name": "Sam Tester",
            "email": email,
            "password": "Secret1!",
            "confirmPassword": "Secret1!",
            "agreedToTerms": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(registered.user.email, email);
    assert_eq!(registered.user.name, "Sam Tester");
    assert_eq!(registered.password_strength, "Strong");

    let listed = list(&client, base).await;
    assert_eq!(listed.user.as_ref().map(|u| u.id.as_str()), Some(registered.user.id.as_str()));
    assert!(listed.cards.is_empty());

    let card = add_titled_card(&client, base, "Read").await;
    assert!(card.id.is_string());

    let logout = client
        .post(format!("{base}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    assert!(list(&client, base).await.cards.iter().all(|c| c.id != card.id));

    let user: SessionUser = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": email, "password": "Secret1!" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user.id, registered.user.id);
    let listed = list(&client, base).await;
    assert_eq!(listed.cards.len(), 1);
    assert_eq!(listed.cards[0].id, card.id);
    assert_eq!(listed.cards[0].title, "Read");

    let prefs: Value = client
        .put(format!("{base}/api/preferences"))
        .json(&json!({ "theme": "dark" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prefs["theme"], json!("dark"));
    assert_eq!(prefs["language"], json!("en"));

    let goal = client
        .post(format!("{base}/api/goals"))
        .json(&json!({ "title": "Read 12 books", "target": 12 }))
        .send()
        .await
        .unwrap();
    assert_eq!(goal.status(), StatusCode::CREATED);
    let goal: Value = goal.json().await.unwrap();
    assert_eq!(goal["status"], json!("active"));
    let goal_id = goal["id"].as_str().unwrap().to_owned();

    let progressed: Value = client
        .patch(format!("{base}/api/goals/{goal_id}/progress"))
        .json(&json!({ "progress": 3 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progressed["currentProgress"], json!(3.0));

    let unknown_goal = client
        .patch(format!("{base}/api/goals/nope/progress"))
        .json(&json!({ "progress": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_goal.status(), StatusCode::NOT_FOUND);

    let tracked = client
        .post(format!("{base}/api/analytics"))
        .json(&json!({ "action": "card_shared", "data": { "card": card.path() } }))
        .send()
        .await
        .unwrap();
    assert_eq!(tracked.status(), StatusCode::NO_CONTENT);

    let export: Value = client
        .get(format!("{base}/api/export"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(export["userId"], json!(user.id));
    assert_eq!(export["cards"].as_array().map(Vec::len), Some(1));
    assert_eq!(export["preferences"]["theme"], json!("dark"));
    assert_eq!(export["goals"][0]["id"], json!(goal_id));

    let stats: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalCards"], json!(1));

    let deleted = client
        .delete(format!("{base}/api/account"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    sleep(Duration::from_millis(100)).await;
    assert!(list(&client, base).await.cards.is_empty());
    let goals: Value = client
        .get(format!("{base}/api/goals"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(goals, json!([]));

    fresh_start(&client, base).await;
}
