use async_trait::async_trait;
use mockall::mock;

use super::{
    blob::{BlobStore, Bucket, Error as BlobError},
    stats::{Error as StatsError, StatsApi},
    webhook::{Error as WebhookError, Notification, Notifier},
};
use crate::domain::ClanMember;

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

mock! {
    pub BlobStore { }

    #[async_trait]
    impl BlobStore for BlobStore {
        async fn upload(&self, bucket: Bucket, name: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
        async fn download(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>, BlobError>;
        async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), BlobError>;
        fn public_url(&self, bucket: Bucket, name: &str) -> String;
    }
}

/// Blob store mock that accepts every upload and delete
pub fn accepting_blob_store() -> MockBlobStore {
    let mut blob = MockBlobStore::new();
    blob.expect_upload().returning(|bucket, name, _| {
        Ok(format!("http://localhost/media/{}/{}", bucket, name))
    });
    blob.expect_delete().returning(|_, _| Ok(()));
    blob.expect_public_url()
        .returning(|bucket, name| format!("http://localhost/media/{}/{}", bucket, name));
    blob
}

/// Notifier mock that swallows every notification
pub fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().returning(|_| Ok(()));
    notifier
}
