use std::time::Duration;

use async_trait::async_trait;
use bluetuith::error::ErrorKind;
use bluetuith::*;

fn transfer_request() -> AuthEventData {
    AuthEventData {
        auth_id: 3,
        event: AuthEventKind::AuthorizeTransfer,
        reply_method: AuthReplyMethod::YesNo,
        timeout_ms: 10_000,
        address: "AC:80:0A:2F:15:E6".parse().unwrap(),
        file_transfer: FileTransferData {
            name: "beach.jpg".into(),
            size: 1024,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn default_authorizer_accepts_transfers() {
    let auth = transfer_request();
    let mut outcome = None;
    auth.call_authorizer(Some(&DefaultAuthorizer), |data, reply, res| {
        assert_eq!(data.auth_id, 3);
        outcome = Some((reply, res.is_ok()));
    })
    .await
    .unwrap();

    let (reply, accepted) = outcome.unwrap();
    assert!(accepted);
    assert_eq!(reply.method, AuthReplyMethod::YesNo);
    assert_eq!(reply.reply, "yes");
}

#[tokio::test]
async fn missing_authorizer_is_rejected_before_any_callback() {
    let mut called = false;
    let err = transfer_request()
        .call_authorizer(None, |_, _, _| called = true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotAvailable);
    assert!(!called);

    let unknown = AuthEventData {
        event: AuthEventKind::None,
        ..transfer_request()
    };
    let err = unknown
        .call_authorizer(Some(&DefaultAuthorizer), |_, _, _| called = true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotAvailable);
    assert!(!called);
}

struct Reluctant;

#[async_trait]
impl SessionAuthorizer for Reluctant {
    async fn confirm_passkey(&self, timeout: AuthTimeout, _address: Address, _passkey: u32) -> Result<()> {
        tokio::time::sleep(timeout.remaining() + Duration::from_secs(1)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_authorizers_time_out() {
    let auth = AuthEventData {
        event: AuthEventKind::ConfirmPasskey,
        passkey: 123456,
        timeout_ms: 500,
        ..transfer_request()
    };

    let mut outcome = None;
    auth.call_authorizer(Some(&Reluctant), |_, _, res| outcome = Some(res))
        .await
        .unwrap();
    let err = outcome.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn unimplemented_methods_reject() {
    let auth = AuthEventData {
        event: AuthEventKind::DisplayPasskey,
        passkey: 42,
        ..transfer_request()
    };

    let mut outcome = None;
    auth.call_authorizer(Some(&Reluctant), |_, reply, res| outcome = Some((reply, res)))
        .await
        .unwrap();
    let (reply, res) = outcome.unwrap();
    assert_eq!(reply.reply, "42");
    assert_eq!(res.unwrap_err().kind(), ErrorKind::NotAuthorized);
}

#[test]
fn timeouts_can_be_cancelled() {
    let timeout = AuthTimeout::new(Duration::from_secs(60));
    let clone = timeout.clone();
    assert!(!clone.is_done());
    timeout.cancel();
    assert!(clone.is_done());
}
