/*!
 * Validation of oracle replies against the prompts actually sent
 */

use std::sync::Arc;

use dataset_translator::errors::ValidationError;
use dataset_translator::providers::mock::MockProvider;
use dataset_translator::translation::{
    Document, InstructionPair, MultipleChoiceQuestion, PromptTemplate, TranslationClient,
};
use dataset_translator::validation::ResponseValidator;

use crate::common::{sample_instructions, sample_questions};

fn client<D: Document>(template: PromptTemplate) -> TranslationClient<D> {
    TranslationClient::new(
        Arc::new(MockProvider::working()),
        template,
        "mock-model",
        "English",
        "Portuguese",
        false,
    )
}

#[test]
fn test_validate_withEchoedInstructionPrompt_shouldReportLeakage() {
    let client = client::<InstructionPair>(PromptTemplate::instructions());
    let prompt = client.render(&sample_instructions(1)[0]).unwrap();

    for lenient in [false, true] {
        let validator = ResponseValidator::for_document::<InstructionPair>(&PromptTemplate::instructions(), lenient);
        for echoed in [&prompt.user, &prompt.system] {
            assert!(
                matches!(validator.validate(echoed), Err(ValidationError::PromptLeakage(_))),
                "lenient={} accepted an echoed prompt",
                lenient
            );
        }
    }
}

#[test]
fn test_validate_withEchoedMultipleChoicePrompt_shouldReportLeakage() {
    let client = client::<MultipleChoiceQuestion>(PromptTemplate::multiple_choice());
    let prompt = client.render(&sample_questions(1)[0]).unwrap();
    let validator = ResponseValidator::for_document::<MultipleChoiceQuestion>(&PromptTemplate::multiple_choice(), true);

    // The user prompt ends with a valid record, so lenient parsing alone would accept it
    assert!(matches!(validator.validate(&prompt.user), Err(ValidationError::PromptLeakage(_))));
}

#[test]
fn test_validate_withTranslatedReply_shouldAccept() {
    let validator = ResponseValidator::for_document::<MultipleChoiceQuestion>(&PromptTemplate::multiple_choice(), true);
    let reply = r#"Aqui está a tradução:
{"id": 100, "question": "Qual comando faz o trabalho 0?", "A": "ls", "B": "cd", "C": "rm", "D": "mv"}"#;

    let object = validator.validate(reply).unwrap();
    let translated = sample_questions(1)[0].translated(&object).unwrap();

    assert_eq!(translated.question, "Qual comando faz o trabalho 0?");
    assert_eq!(translated.answer, "A");
}

#[test]
fn test_validate_withTemplateTokenInReply_shouldReject() {
    let validator = ResponseValidator::for_document::<InstructionPair>(&PromptTemplate::instructions(), false);
    let reply = r#"{"instruction": "Traduza {document}", "output": "ok"}"#;

    assert!(matches!(validator.validate(reply), Err(ValidationError::UnsubstitutedPlaceholder(_))));
}
