use mml_core::MmlError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> MmlError {
    MmlError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: MmlError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> MmlError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_source_scan(error: std::path::StripPrefixError) -> MmlError {
    map_error("CLI_SOURCE_SCAN", error)
}

pub(crate) fn map_cli_source_read(error: std::io::Error) -> MmlError {
    map_error("CLI_SOURCE_READ", error)
}

pub(crate) fn map_cli_source_write(error: std::io::Error) -> MmlError {
    map_error("CLI_SOURCE_WRITE", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> MmlError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_config_invalid(error: serde_json::Error) -> MmlError {
    map_error("CLI_CONFIG_INVALID", error)
}

pub(crate) fn map_cli_json(error: serde_json::Error) -> MmlError {
    map_error("CLI_JSON", error)
}

pub(crate) fn map_store_read(error: std::io::Error) -> MmlError {
    map_error("STORE_READ", error)
}

pub(crate) fn map_store_write(error: std::io::Error) -> MmlError {
    map_error("STORE_WRITE", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(MmlError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(
            map_cli_source_path(std::io::Error::other("path")).code,
            "CLI_SOURCE_PATH"
        );

        let strip_error = std::path::Path::new("/a")
            .strip_prefix("/b")
            .expect_err("strip prefix");
        assert_eq!(map_cli_source_scan(strip_error).code, "CLI_SOURCE_SCAN");

        assert_eq!(
            map_cli_source_read(std::io::Error::other("read")).code,
            "CLI_SOURCE_READ"
        );
        assert_eq!(
            map_cli_source_write(std::io::Error::other("write")).code,
            "CLI_SOURCE_WRITE"
        );
        assert_eq!(
            map_cli_config_read(std::io::Error::other("read")).code,
            "CLI_CONFIG_READ"
        );
        assert_eq!(
            map_store_read(std::io::Error::other("read")).code,
            "STORE_READ"
        );
        assert_eq!(
            map_store_write(std::io::Error::other("write")).code,
            "STORE_WRITE"
        );

        let invalid = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        assert_eq!(map_cli_config_invalid(invalid).code, "CLI_CONFIG_INVALID");
        let invalid = serde_json::from_str::<serde_json::Value>("[").expect_err("invalid json");
        assert_eq!(map_cli_json(invalid).code, "CLI_JSON");
    }
}
