//! Declarative macros for ergonomic effect construction

/// Create an `Effect::Document` that appends a new document
///
/// # Example
///
/// ```rust,ignore
/// use naks_yetu_core::append_document;
///
/// append_document! {
///     store: env.store,
///     key: DocumentKey::new("audit_logs", entry.id.to_string()),
///     document: body,
///     on_success: |_revision| None,
///     on_error: |error| Some(ModerationAction::AuditAppendFailed { error: error.to_string() })
/// }
/// ```
#[macro_export]
macro_rules! append_document {
    (
        store: $store:expr,
        key: $key:expr,
        document: $document:expr,
        on_success: |$success_param:pat_param| $success_body:expr,
        on_error: |$error_param:ident| $error_body:expr
    ) => {
        $crate::effect::Effect::Document($crate::effect::DocumentOperation::Append {
            store: ::std::sync::Arc::clone(&$store),
            key: $key,
            document: $document,
            on_success: ::std::boxed::Box::new(
                move |$success_param: $crate::document_store::Revision| $success_body,
            ),
            on_error: ::std::boxed::Box::new(
                move |$error_param: $crate::document_store::DocumentStoreError| $error_body,
            ),
        })
    };
}

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use naks_yetu_core::async_effect;
///
/// async_effect! {
///     match mailer.send(message).await {
///         Ok(()) => None,
///         Err(error) => Some(UserAdminAction::NotificationFailed { error: error.to_string() }),
///     }
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}
