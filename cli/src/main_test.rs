use super::*;
use admin_console::session::MemoryStorage;

fn context() -> AppContext {
    AppContext::connect(AppConfig::default(), Arc::new(MemoryStorage::new())).unwrap()
}

#[test]
fn io_failures_surface_as_unhandled() {
    let ctx = context();
    let err = CliError::Io(std::io::Error::other("stdin closed"));

    surface_unhandled(&ctx, &err);

    let error = ctx.signals.error();
    assert!(error.visible);
    assert_eq!(error.message, "io error: stdin closed");
    assert!(error.retry.is_none());
}

#[test]
fn json_failures_surface_as_unhandled() {
    let ctx = context();
    let err = CliError::InvalidJson(serde_json::from_str::<Value>("{").unwrap_err());

    surface_unhandled(&ctx, &err);

    assert!(ctx.signals.has_error());
}

#[test]
fn handled_failures_are_left_alone() {
    let ctx = context();

    surface_unhandled(&ctx, &CliError::Api(ApiError::SessionExpired));
    surface_unhandled(&ctx, &CliError::Login(LoginError::EmailRequired));
    surface_unhandled(&ctx, &CliError::NotAuthenticated);

    assert!(!ctx.signals.has_error());
}
