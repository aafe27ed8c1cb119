use support_chat::message::{ChatMessage, MessageRole};
use support_chat::services::chatbot::{Stage, detect_stage, generate_reply};

#[test]
fn test_detect_stage() {
    assert_eq!(detect_stage("How much is a flight to Paris?"), Stage::Product);
    assert_eq!(detect_stage("Is the hotel available in May"), Stage::Product);
    assert_eq!(detect_stage("I get an error when I pay"), Stage::Technical);
    assert_eq!(detect_stage("the booking page is not working"), Stage::Technical);
    assert_eq!(detect_stage("I need a refund for my excursion"), Stage::CustomerService);
    assert_eq!(detect_stage("Can I talk to a real person?"), Stage::Human);
    assert_eq!(detect_stage("random text"), Stage::CustomerService);
}

#[test]
fn test_stage_nodes_belong_to_the_workflow() {
    let graph = support_chat::graph::WorkflowGraphState::support_workflow();
    for stage in [Stage::Product, Stage::Technical, Stage::CustomerService, Stage::Human] {
        assert!(graph.has_edge("ROUTER", stage.node_id()));
    }
    assert!(Stage::Human.requires_action());
    assert!(!Stage::Product.requires_action());
}

#[test]
fn test_replies_per_stage() {
    let history = vec![ChatMessage::new(MessageRole::User, "my app crashes")];

    let technical = generate_reply(Stage::Technical, &history, "my app crashes");
    assert!(technical.contains("\"my app crashes\""));

    let product = generate_reply(Stage::Product, &history, "price?");
    assert!(product.contains("availability"));

    let human = generate_reply(Stage::Human, &history, "human please");
    assert!(human.contains("support team"));

    let service = generate_reply(Stage::CustomerService, &history, "billing");
    assert!(service.contains("booking reference"));
}
