use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use clanhub::{
    app,
    config::{AuthSettings, OperatorSettings},
    domain::{
        hash_token, BingoService, BingoStore, BountyService, BountyStore, ClanMember, ClanService,
        ClanStore, OperatorDirectory,
    },
    infra::{
        blob::LocalBlobStore,
        stats::{Error as StatsError, StatsApi},
        webhook::{Error as WebhookError, Notification, Notifier},
    },
    AppState, DBConnection, DatabasePoolConfig, DatabaseType,
};
use mockall::mock;
use serde_json::Value;
use std::{
    path::PathBuf,
    sync::{Arc, Once},
};
use tower::ServiceExt;
use uuid::Uuid;

mock! {
    pub StatsClient { }

    #[async_trait]
    impl StatsApi for StatsClient {
        async fn group_members(&self, group_id: u64) -> Result<Vec<ClanMember>, StatsError>;
        async fn update_player(&self, username: &str) -> Result<ClanMember, StatsError>;
    }
}

mock! {
    pub Notifier { }

    #[async_trait]
    impl Notifier for Notifier {
        async fn notify(&self, notification: Notification) -> Result<(), WebhookError>;
    }
}

static INIT_LOGGER: Once = Once::new();

pub fn setup_static_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const OPERATOR_TOKEN: &str = "operator-test-token";
pub const GROUP_ID: u64 = 139;
const BOUNDARY: &str = "clanhub-test-boundary";

/// A tiny but well formed png header, the proof checks only look at type and size
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

pub fn member(id: i64, name: &str, ehb: f64) -> ClanMember {
    ClanMember {
        id,
        username: name.to_lowercase(),
        display_name: name.to_string(),
        account_type: String::from("regular"),
        ehb,
        ehp: 40.0,
        ttm: 250.0,
    }
}

pub struct TestApp {
    pub router: Router,
    pub media_folder: PathBuf,
}

impl TestApp {
    pub async fn new(stats: MockStatsClient) -> Self {
        setup_static_logger();
        let test_id = Uuid::now_v7();
        let root = std::env::temp_dir().join(format!("clanhub-test-{}", test_id));
        let data_folder = root.join("data").to_string_lossy().to_string();
        let media_folder = root.join("media");

        let pool_config = DatabasePoolConfig::testing();
        let clan_db = DBConnection::new(
            &data_folder,
            "clan",
            pool_config.clone(),
            DatabaseType::Clan,
        )
        .await
        .unwrap();
        let bingo_db = DBConnection::new(&data_folder, "bingo", pool_config, DatabaseType::Bingo)
            .await
            .unwrap();

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));
        let notifier = Arc::new(notifier);

        let blob = Arc::new(LocalBlobStore::new(
            &media_folder.to_string_lossy(),
            "http://localhost:9990/media",
        ));

        let bounty_store = BountyStore::new(clan_db.clone());
        let clan = ClanService::new(
            Arc::new(stats),
            ClanStore::new(clan_db),
            bounty_store.clone(),
            GROUP_ID,
        );
        let bounties = BountyService::new(bounty_store, blob.clone(), notifier.clone());
        let bingo = BingoService::new(BingoStore::new(bingo_db), blob.clone(), notifier);

        let identity = OperatorDirectory::new(&AuthSettings {
            operators: vec![OperatorSettings {
                name: String::from("tester"),
                token_hash: hash_token(OPERATOR_TOKEN).unwrap(),
            }],
        });

        let app_state = AppState {
            clan: Arc::new(clan),
            bounties: Arc::new(bounties),
            bingo: Arc::new(bingo),
            identity: Arc::new(identity),
            blob,
            max_upload_bytes: 1024 * 1024,
        };

        TestApp {
            router: app(app_state, vec![String::from("http://localhost:5173")]),
            media_folder,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn operator_get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(operator_request(Method::GET, uri, None)).await
    }

    pub async fn operator_json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(operator_request(method, uri, Some(body))).await
    }

    pub async fn upload(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        proof: Option<(&str, &[u8])>,
        operator: bool,
    ) -> (StatusCode, Value) {
        let mut builder = Request::post(uri).header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if operator {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", OPERATOR_TOKEN));
        }
        let request = builder
            .body(Body::from(multipart_body(fields, proof)))
            .unwrap();
        self.send(request).await
    }
}

pub fn operator_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", OPERATOR_TOKEN));
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn multipart_body(fields: &[(&str, &str)], proof: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, bytes)) = proof {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"proof\"; filename=\"proof\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
