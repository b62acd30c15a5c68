mod helpers;

use helpers::*;
use majstor_backend::error::AppError;
use majstor_backend::services::*;

#[tokio::test]
async fn test_conversation_is_reused_per_pair() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;

    let first = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: provider.id,
                case_id: None,
            },
        )
        .await
        .unwrap();
    let again = state
        .chat
        .open_conversation(
            &provider,
            OpenConversationRequest {
                participant_id: customer.id,
                case_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(first.customer_id, customer.id);
    assert_eq!(first.provider_id, provider.id);
}

#[tokio::test]
async fn test_customers_cannot_chat_with_each_other() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let other = register_customer(&state).await;

    let result = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: other.id,
                case_id: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_messages_unread_counts_and_read_marks() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_open_case(&state, &customer).await;

    let conversation = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: provider.id,
                case_id: Some(case.id),
            },
        )
        .await
        .unwrap();

    state
        .chat
        .send_message(&customer, conversation.id, "  Кога можете да дойдете?  ")
        .await
        .unwrap();
    state
        .chat
        .send_message(&customer, conversation.id, "Адресът е в Лозенец")
        .await
        .unwrap();
    let reply = state
        .chat
        .send_message(&provider, conversation.id, "Утре в 10")
        .await
        .unwrap();
    assert_eq!(reply.body, "Утре в 10");

    let messages = state
        .chat
        .list_messages(&provider, conversation.id, None, None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].body, "Кога можете да дойдете?");

    let inbox = state
        .chat
        .list_conversations(&provider, Pagination::default())
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].unread_count, 2);

    let marked = state.chat.mark_read(&provider, conversation.id).await.unwrap();
    assert_eq!(marked, 2);

    let inbox = state
        .chat
        .list_conversations(&provider, Pagination::default())
        .await
        .unwrap();
    assert_eq!(inbox[0].unread_count, 0);
}

#[tokio::test]
async fn test_outsiders_cannot_read_or_write() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let outsider = register_provider(&state).await;

    let conversation = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: provider.id,
                case_id: None,
            },
        )
        .await
        .unwrap();

    let result = state
        .chat
        .send_message(&outsider, conversation.id, "Здравейте")
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = state
        .chat
        .list_messages(&outsider, conversation.id, None, None)
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;

    let conversation = state
        .chat
        .open_conversation(
            &customer,
            OpenConversationRequest {
                participant_id: provider.id,
                case_id: None,
            },
        )
        .await
        .unwrap();

    let result = state.chat.send_message(&customer, conversation.id, "   ").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_review_after_completion_updates_rating() {
    let state = test_state();
    let customer = register_customer(&state).await;
    let provider = register_provider(&state).await;
    let case = create_direct_case(&state, &customer, &provider).await;

    let early = state
        .reviews
        .create_review(
            &customer,
            case.id,
            CreateReviewRequest {
                rating: 5,
                comment: None,
            },
        )
        .await;
    assert!(matches!(early, Err(AppError::BusinessLogic(_))));

    state.cases.accept_case(&provider, case.id).await.unwrap();
    state.cases.complete_case(&provider, case.id).await.unwrap();

    let review = state
        .reviews
        .create_review(
            &customer,
            case.id,
            CreateReviewRequest {
                rating: 4,
                comment: Some("Бърз и точен".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(review.provider_id, provider.id);

    let duplicate = state
        .reviews
        .create_review(
            &customer,
            case.id,
            CreateReviewRequest {
                rating: 1,
                comment: None,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(AppError::BusinessLogic(_))));

    let profile = state.providers.get_profile(provider.id).await.unwrap();
    assert_eq!(profile.review_count, 1);
    assert_eq!(profile.rating_avg, rust_decimal::Decimal::new(4, 0));

    let reviews = state
        .reviews
        .list_reviews(provider.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
}
