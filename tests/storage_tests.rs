use shareboard::storage::{MockStorageService, S3StorageClient, StorageService, sanitize_key};
use uuid::Uuid;

#[test]
fn test_sanitize_key_strips_traversal() {
    assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
    assert_eq!(sanitize_key("/uploads//./a.png"), "uploads/a.png");
    assert_eq!(sanitize_key("uploads/a.png"), "uploads/a.png");
    assert_eq!(sanitize_key("../.."), "");
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "uploads/test.png";
        let url = mock.get_presigned_upload_url(key, "image/png").await.unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        assert!(mock.get_presigned_upload_url("a.png", "image/png").await.is_err());
        assert!(mock.delete_object("a.png").await.is_err());
        assert!(mock.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn test_mock_records_deletions_across_clones() {
        let mock = MockStorageService::new();
        let shared = mock.clone();

        shared.delete_object("uploads/one.png").await.unwrap();
        shared.delete_object("../uploads/two.png").await.unwrap();

        assert_eq!(mock.deleted_keys(), vec!["uploads/one.png", "uploads/two.png"]);
    }

    #[test]
    fn test_mock_public_url_is_sanitised() {
        let mock = MockStorageService::new();
        assert_eq!(
            mock.public_url("../secret.png"),
            "http://localhost:9000/mock-bucket/secret.png"
        );
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    async fn client() -> S3StorageClient {
        S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
            "http://cdn.example.com/testbucket/",
        )
        .await
    }

    #[tokio::test]
    async fn test_s3_public_url_uses_public_base() {
        let client = client().await;
        assert_eq!(
            client.public_url("uploads/a.png"),
            "http://cdn.example.com/testbucket/uploads/a.png"
        );
    }

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        // Presigning is a local computation; no server needs to be listening.
        let client = client().await;
        let key = format!("uploads/{}.jpg", Uuid::new_v4());

        let url = client.get_presigned_upload_url(&key, "image/jpeg").await.unwrap();

        assert!(url.contains("localhost:9000"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
