//! Websocket close codes.
//!
//! Names and descriptions follow the registry at
//! <https://github.com/Luka967/websocket-close-codes>.

pub const NORMAL: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED_DATA: u16 = 1003;
pub const NO_STATUS: u16 = 1005;
pub const ABNORMAL: u16 = 1006;
pub const INVALID_PAYLOAD: u16 = 1007;
pub const POLICY_VIOLATION: u16 = 1008;
pub const TOO_LARGE: u16 = 1009;
pub const MANDATORY_EXTENSION: u16 = 1010;
pub const SERVER_ERROR: u16 = 1011;
pub const SERVICE_RESTART: u16 = 1012;
pub const TRY_AGAIN_LATER: u16 = 1013;
pub const BAD_GATEWAY: u16 = 1014;
pub const TLS_HANDSHAKE_FAIL: u16 = 1015;

/// Returns the name and description of a known close code.
pub fn describe(code: u16) -> Option<(&'static str, &'static str)> {
    let found = match code {
        NORMAL => ("Close Normal", "Successful operation / regular socket shutdown."),
        GOING_AWAY => (
            "Close Going Away",
            "Endpoint is leaving (server going down or browser tab closing).",
        ),
        PROTOCOL_ERROR => ("Close Protocol Error", "Endpoint received a malformed frame."),
        UNSUPPORTED_DATA => (
            "Close Unsupported Data",
            "Endpoint received an unsupported type of data (e.g. binary-only endpoint received text frame).",
        ),
        NO_STATUS => ("Close No Status", "Expected close status, received none."),
        ABNORMAL => ("Close Abnormal", "No close code frame has been receieved."),
        INVALID_PAYLOAD => (
            "Close Invalid Payload",
            "Endpoint received inconsistent message (e.g. malformed UTF-8).",
        ),
        POLICY_VIOLATION => (
            "Close Policy Violation",
            "Generic code used for situations other than 1003 and 1009.",
        ),
        TOO_LARGE => ("Close Too Large", "Endpoint won't process large frame."),
        MANDATORY_EXTENSION => (
            "Close Mandatory Extension",
            "Client wanted an extension which server did not negotiate.",
        ),
        SERVER_ERROR => ("Close Server Error", "Internal server error while operating."),
        SERVICE_RESTART => ("Close Service Restart", "Server/service is restarting."),
        TRY_AGAIN_LATER => (
            "Close Try Again Later",
            "Temporary server condition forced blocking client's request.",
        ),
        BAD_GATEWAY => (
            "Close Bad Gateway",
            "Server acting as gateway received an invalid response.",
        ),
        TLS_HANDSHAKE_FAIL => (
            "Close TLS Handshake Fail",
            "Transport Layer Security handshake failure.",
        ),
        _ => return None,
    };
    Some(found)
}
