/*!
 * Tests for error messages and conversions
 */

use anyhow::anyhow;

use dataset_translator::errors::{AppError, ErrorKind, ItemFailure, ProviderError, TranslationError, ValidationError};

#[test]
fn test_itemFailure_display_shouldNameAttemptsAndCause() {
    let exhausted = ItemFailure::RetryExhausted {
        attempts: 3,
        last: TranslationError::Validation(ValidationError::MissingKey("output".to_string())),
    };
    let message = exhausted.to_string();
    assert!(message.contains("3 attempts"), "{}", message);
    assert!(message.contains("missing required key 'output'"), "{}", message);

    let aborted = ItemFailure::Unclassified {
        attempt: 1,
        error: TranslationError::from(ProviderError::AuthenticationError("bad key".to_string())),
    };
    assert!(aborted.to_string().starts_with("aborted on attempt 1"));
    assert!(aborted.to_string().contains("bad key"));
}

#[test]
fn test_translationError_connectionFailure_shouldNotBeRetried() {
    let error = TranslationError::from(ProviderError::ConnectionError("refused".to_string()));

    assert_eq!(error.kind(), ErrorKind::Unclassified);
    assert_eq!(error.kind().to_string(), "unclassified");
}

#[test]
fn test_providerError_unprocessableEntity_shouldBeTransient() {
    assert!(ProviderError::from_status(422, "schema").is_transient());
    assert!(!ProviderError::from_status(403, "forbidden").is_transient());
}

#[test]
fn test_appError_conversions_shouldPickMatchingVariant() {
    let from_io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(from_io, AppError::File(_)));

    let from_anyhow: AppError = anyhow!("something odd").into();
    assert_eq!(from_anyhow.to_string(), "Unknown error: something odd");

    let from_translation: AppError = TranslationError::Unclassified("boom".to_string()).into();
    assert!(matches!(from_translation, AppError::Translation(_)));
}
