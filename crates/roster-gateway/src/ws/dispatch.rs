use roster_core::registration::{CancellationRequest, RegistrationRequest};
use roster_protocol::frames::{InboundFrame, ResFrame};
use roster_protocol::methods::{PING, ROSTER_CANCEL, ROSTER_REGISTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::actions::{self, ActionResult};
use crate::app::AppState;
use crate::ws::connection::WsSession;

/// Handle one inbound text frame. `None` means nothing to answer.
pub async fn handle(
    text: &str,
    session: &WsSession,
    app: &AppState,
) -> Option<ResFrame<ActionResult>> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id = %session.conn_id, error = %e, "malformed frame");
            return None;
        }
    };
    let req = frame.as_req()?;
    Some(route(&req.method, req.params.as_ref(), &req.id, session, app).await)
}

/// Route a WS method call to the correct handler.
pub async fn route(
    method: &str,
    params: Option<&Value>,
    req_id: &str,
    session: &WsSession,
    app: &AppState,
) -> ResFrame<ActionResult> {
    match method {
        PING => ResFrame::ok(req_id, ActionResult::ok(false)),

        ROSTER_REGISTER => {
            let Some(account) = session.account.as_deref() else {
                return unauthorized(req_id);
            };
            match parse_params::<RegistrationRequest>(params) {
                Some(req) => {
                    let result = actions::register(app, &session.event_id, &req, account).await;
                    to_res(req_id, result)
                }
                None => ResFrame::err(req_id, "PROTOCOL_ERROR", "invalid roster.register params"),
            }
        }

        ROSTER_CANCEL => {
            let Some(account) = session.account.as_deref() else {
                return unauthorized(req_id);
            };
            match parse_params::<CancellationRequest>(params) {
                Some(req) => {
                    let result = actions::cancel(app, &session.event_id, &req, account).await;
                    to_res(req_id, result)
                }
                None => ResFrame::err(req_id, "PROTOCOL_ERROR", "invalid roster.cancel params"),
            }
        }

        other => ResFrame::err(
            req_id,
            "METHOD_NOT_FOUND",
            &format!("unknown method: {}", other),
        ),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<&Value>) -> Option<T> {
    params.and_then(|p| serde_json::from_value(p.clone()).ok())
}

fn unauthorized(req_id: &str) -> ResFrame<ActionResult> {
    ResFrame::err(req_id, "UNAUTHORIZED", "sign in to change the roster")
}

fn to_res(req_id: &str, result: ActionResult) -> ResFrame<ActionResult> {
    match (result.code, &result.msg) {
        (Some(code), Some(msg)) if result.error => ResFrame::err(req_id, code, msg),
        _ => ResFrame::ok(req_id, result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, EVENT_ID};

    fn session(account: Option<&str>) -> WsSession {
        WsSession {
            conn_id: "c-1".to_string(),
            event_id: EVENT_ID.to_string(),
            account: account.map(String::from),
        }
    }

    async fn call(text: &str, account: Option<&str>) -> ResFrame<ActionResult> {
        let (state, _) = test_state(7);
        handle(text, &session(account), &state).await.expect("response")
    }

    #[tokio::test]
    async fn ping_is_acknowledged() {
        let res = call(r#"{"type":"req","id":"1","method":"ping"}"#, None).await;
        assert!(res.ok);
        assert_eq!(res.payload, Some(ActionResult::ok(false)));
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            serde_json::json!({ "type": "res", "id": "1", "ok": true, "payload": { "error": false } })
        );
    }

    #[tokio::test]
    async fn register_needs_an_account() {
        let text = r#"{"type":"req","id":"2","method":"roster.register","params":{"team":"Rojo","playerName":"Ana"}}"#;
        let res = call(text, None).await;
        assert_eq!(res.error.unwrap().code, "UNAUTHORIZED");

        let res = call(text, Some("acc-1")).await;
        assert!(res.ok, "{:?}", res.error);
        assert!(!res.payload.unwrap().error);
    }

    #[tokio::test]
    async fn rejection_maps_to_error_frame() {
        let text = r#"{"type":"req","id":"3","method":"roster.cancel","params":{"team":"Verde","playerName":"Ana"}}"#;
        let res = call(text, Some("acc-1")).await;
        assert!(!res.ok);
        assert_eq!(res.error.unwrap().code, "UNKNOWN_TEAM");
    }

    #[tokio::test]
    async fn unknown_method_and_non_req_frames() {
        let res = call(r#"{"type":"req","id":"4","method":"roster.drop"}"#, None).await;
        assert_eq!(res.error.unwrap().code, "METHOD_NOT_FOUND");

        let (state, _) = test_state(7);
        let none = handle(r#"{"type":"event","event":"tick"}"#, &session(None), &state).await;
        assert!(none.is_none());
    }
}
