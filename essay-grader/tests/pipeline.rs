mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{model, Call, CannedLlm, ESSAY, SUMMARY};
use essay_grader::nodes::{average_score, AggregationNode, GENERATE_TOPIC, GET_FINAL_FEEDBACK};
use essay_grader::{EssayGrader, EssayState, GraderSettings, Rubric, TopicMode};
use grader_core::GraderError;
use grader_graph::{
    ExecutionConfig, ExecutionOptions, GraphContext, GraphError, GraphNode, GraphState, Observer,
};

fn grader(llm: &Arc<CannedLlm>, topic_mode: TopicMode) -> EssayGrader {
    let settings = GraderSettings {
        topic_mode,
        ..GraderSettings::default()
    };
    EssayGrader::new(model(llm), settings).unwrap()
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn position(&self, event: &str) -> usize {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .position(|logged| logged == event)
            .unwrap_or_else(|| panic!("{event} not in {events:?}"))
    }
}

impl Observer for EventLog {
    fn on_node_start(&self, node: &str, _step: usize) {
        self.events.lock().unwrap().push(format!("start:{node}"));
    }

    fn on_node_end(&self, node: &str, _step: usize, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("end:{node}"));
    }

    fn on_error(&self, node: &str, _error: &GraderError) {
        self.events.lock().unwrap().push(format!("error:{node}"));
    }
}

#[tokio::test]
async fn grades_an_essay_end_to_end() {
    let llm = Arc::new(CannedLlm::new());
    let grader = grader(&llm, TopicMode::Generate);

    let state = grader.grade(ESSAY).await.unwrap();

    assert_eq!(state.essay, ESSAY);
    assert_eq!(state.essay_topic.as_deref(), Some("Water scarcity in India"));
    assert_eq!(
        state.language_feedback.as_deref(),
        Some("Fluent prose with minor slips.")
    );
    assert_eq!(
        state.cot_feedback.as_deref(),
        Some("The argument is easy to follow.")
    );
    assert_eq!(
        state.doa_feedback.as_deref(),
        Some("Causes are listed but not examined.")
    );
    assert_eq!(state.individual_scores, vec![7, 8, 6]);
    assert_eq!(state.average_score, Some(7.0));
    assert_eq!(state.final_feedback.as_deref(), Some(SUMMARY));

    assert_eq!(llm.count(Call::Topic), 1);
    assert_eq!(llm.count(Call::Aggregation), 1);
    for rubric in Rubric::ALL {
        assert_eq!(llm.count(Call::Evaluation(rubric)), 1);
    }
}

#[tokio::test]
async fn aggregation_prompt_carries_every_feedback() {
    let llm = Arc::new(CannedLlm::new());
    grader(&llm, TopicMode::Generate).grade(ESSAY).await.unwrap();

    let prompts = llm.prompts_for(Call::Aggregation);
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("language control -> Fluent prose with minor slips.\n"));
    assert!(prompts[0].contains("depth of analysis -> Causes are listed but not examined.\n"));
    assert!(prompts[0].contains("clarity of thought -> The argument is easy to follow.\n"));
}

#[tokio::test]
async fn generated_topic_stays_out_of_evaluations_by_default() {
    let llm = Arc::new(CannedLlm::new());
    grader(&llm, TopicMode::Generate).grade(ESSAY).await.unwrap();

    for rubric in Rubric::ALL {
        for prompt in llm.prompts_for(Call::Evaluation(rubric)) {
            assert!(!prompt.contains("Water scarcity in India"));
            assert!(prompt.contains(ESSAY));
        }
    }
}

#[tokio::test]
async fn contextual_mode_mentions_the_topic_in_evaluations() {
    let llm = Arc::new(CannedLlm::new());
    let state = grader(&llm, TopicMode::Contextual)
        .grade(ESSAY)
        .await
        .unwrap();

    assert_eq!(state.average_score, Some(7.0));
    for rubric in Rubric::ALL {
        let prompts = llm.prompts_for(Call::Evaluation(rubric));
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("written on the topic \"Water scarcity in India\""));
    }
}

#[tokio::test]
async fn skip_mode_has_no_topic_step() {
    let llm = Arc::new(CannedLlm::new());
    let grader = grader(&llm, TopicMode::Skip);

    assert!(!grader
        .graph()
        .node_names()
        .contains(&GENERATE_TOPIC.to_string()));
    let state = grader.grade(ESSAY).await.unwrap();

    assert_eq!(state.essay_topic, None);
    assert_eq!(state.average_score, Some(7.0));
    assert_eq!(llm.count(Call::Topic), 0);
}

#[tokio::test]
async fn supplied_topic_is_kept_without_a_model_call() {
    let llm = Arc::new(CannedLlm::new());
    let state = grader(&llm, TopicMode::Contextual)
        .grade_with_topic(ESSAY, "Groundwater depletion")
        .await
        .unwrap();

    assert_eq!(state.essay_topic.as_deref(), Some("Groundwater depletion"));
    assert_eq!(llm.count(Call::Topic), 0);
    let prompts = llm.prompts_for(Call::Evaluation(Rubric::LanguageControl));
    assert!(prompts[0].contains("\"Groundwater depletion\""));
}

#[tokio::test]
async fn graph_plans_topic_then_fan_out_then_join() {
    let llm = Arc::new(CannedLlm::new());
    let generate = grader(&llm, TopicMode::Generate);

    assert_eq!(
        generate.graph().supersteps(),
        vec![
            vec![GENERATE_TOPIC.to_string()],
            Rubric::ALL
                .iter()
                .map(|rubric| rubric.node_name().to_string())
                .collect::<Vec<_>>(),
            vec![GET_FINAL_FEEDBACK.to_string()],
        ]
    );

    let skip = grader(&llm, TopicMode::Skip);
    assert_eq!(skip.graph().supersteps().len(), 2);
}

#[tokio::test]
async fn rerunning_the_same_essay_gives_the_same_state() {
    let llm = Arc::new(
        CannedLlm::new().with_delay(
            Call::Evaluation(Rubric::LanguageControl),
            Duration::from_millis(80),
        ),
    );
    let grader = grader(&llm, TopicMode::Generate);

    let first = grader.grade(ESSAY).await.unwrap();
    let second = grader.grade(ESSAY).await.unwrap();

    assert_eq!(first, second);
    // Scores land in declaration order even when the first evaluation
    // finishes last.
    assert_eq!(first.individual_scores, vec![7, 8, 6]);
}

#[tokio::test]
async fn aggregation_waits_for_the_slowest_evaluation() {
    let llm = Arc::new(CannedLlm::new().with_delay(
        Call::Evaluation(Rubric::DepthOfAnalysis),
        Duration::from_millis(300),
    ));
    let grader = grader(&llm, TopicMode::Generate);
    let observer = Arc::new(EventLog::default());
    let hooks: Arc<dyn Observer> = observer.clone();

    let state = grader
        .grade_with_options(
            EssayState::new(ESSAY),
            ExecutionOptions {
                observer: Some(hooks),
                ..ExecutionOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(state.individual_scores.len(), 3);
    assert_eq!(state.average_score, Some(7.0));
    assert_eq!(llm.count(Call::Aggregation), 1);
    assert_eq!(llm.calls().last(), Some(&Call::Aggregation));

    let final_start = observer.position(&format!("start:{GET_FINAL_FEEDBACK}"));
    for rubric in Rubric::ALL {
        assert!(observer.position(&format!("end:{}", rubric.node_name())) < final_start);
    }
}

#[tokio::test]
async fn evaluations_run_concurrently() {
    let delay = Duration::from_millis(250);
    let llm = Arc::new(
        CannedLlm::new()
            .with_delay(Call::Evaluation(Rubric::LanguageControl), delay)
            .with_delay(Call::Evaluation(Rubric::ClarityOfThought), delay)
            .with_delay(Call::Evaluation(Rubric::DepthOfAnalysis), delay),
    );
    let grader = grader(&llm, TopicMode::Skip);

    let started = Instant::now();
    grader.grade(ESSAY).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test]
async fn malformed_evaluation_aborts_before_aggregation() {
    let llm = Arc::new(CannedLlm::new().with_reply(
        Rubric::ClarityOfThought,
        r#"{"feedback": "ok", "score": 11}"#,
    ));
    let grader = grader(&llm, TopicMode::Generate);

    let err = grader.grade(ESSAY).await.unwrap_err();
    match &err {
        GraphError::NodeFailed { node, source } => {
            assert_eq!(node, Rubric::ClarityOfThought.node_name());
            assert!(matches!(source, GraderError::ParseFailed { .. }));
        }
        other => panic!("expected NodeFailed, got {other:?}"),
    }
    assert_eq!(llm.count(Call::Aggregation), 0);
}

#[tokio::test]
async fn empty_feedback_aborts_the_run() {
    let llm = Arc::new(CannedLlm::new().with_reply(
        Rubric::LanguageControl,
        r#"{"feedback": "", "score": 9}"#,
    ));

    let err = grader(&llm, TopicMode::Skip).grade(ESSAY).await.unwrap_err();
    assert!(matches!(
        err.node_error(),
        Some(GraderError::ParseFailed { .. })
    ));
    assert_eq!(llm.count(Call::Aggregation), 0);
}

#[tokio::test]
async fn provider_failure_is_reported_with_the_failing_task() {
    let llm = Arc::new(CannedLlm::new().failing(Rubric::DepthOfAnalysis));

    let err = grader(&llm, TopicMode::Generate)
        .grade(ESSAY)
        .await
        .unwrap_err();

    match err {
        GraphError::NodeFailed { node, source } => {
            assert_eq!(node, "get_doa_feedback");
            assert!(matches!(source, GraderError::LlmProvider(msg) if msg == "quota exhausted"));
        }
        other => panic!("expected NodeFailed, got {other:?}"),
    }
    assert_eq!(llm.count(Call::Aggregation), 0);
}

#[tokio::test]
async fn slow_model_calls_time_out() {
    let llm = Arc::new(CannedLlm::new().with_delay(Call::Topic, Duration::from_millis(500)));
    let settings = GraderSettings {
        topic_mode: TopicMode::Generate,
        execution: ExecutionConfig {
            node_timeout: Some(Duration::from_millis(50)),
            ..ExecutionConfig::default()
        },
    };
    let grader = EssayGrader::new(model(&llm), settings).unwrap();

    let err = grader.grade(ESSAY).await.unwrap_err();
    assert!(matches!(
        err,
        GraphError::NodeFailed { ref node, source: GraderError::Timeout(_) } if node == GENERATE_TOPIC
    ));
}

#[tokio::test]
async fn aggregation_rejects_an_incomplete_join() {
    let llm = Arc::new(CannedLlm::new());
    let node = AggregationNode::new(model(&llm));
    let context = GraphContext {
        node: GET_FINAL_FEEDBACK.to_string(),
        step: 2,
    };

    let mut partial = EssayState::new(ESSAY);
    partial.language_feedback = Some("fluent".to_string());
    partial.cot_feedback = Some("clear".to_string());
    partial.individual_scores = vec![7, 8];

    let err = node
        .invoke_with_context(GraphState::new(partial.clone()), &context)
        .await
        .unwrap_err();
    assert!(matches!(&err, GraderError::JoinPrecondition(msg) if msg.contains("doa_feedback")));

    partial.doa_feedback = Some("shallow".to_string());
    let err = node
        .invoke_with_context(GraphState::new(partial), &context)
        .await
        .unwrap_err();
    assert!(matches!(&err, GraderError::JoinPrecondition(msg) if msg.contains("expected 3 scores")));
    assert_eq!(llm.count(Call::Aggregation), 0);
}

#[test]
fn average_of_known_scores() {
    assert_eq!(average_score(&[7, 8, 6]).unwrap(), 7.0);
    assert_eq!(average_score(&[10, 9, 9]).unwrap(), 28.0 / 3.0);
    assert!(matches!(
        average_score(&[]),
        Err(GraderError::JoinPrecondition(_))
    ));
}

#[test]
fn topic_mode_parses_case_insensitively() {
    assert_eq!("Contextual".parse::<TopicMode>(), Ok(TopicMode::Contextual));
    assert_eq!(" skip ".parse::<TopicMode>(), Ok(TopicMode::Skip));
    assert_eq!(TopicMode::default(), TopicMode::Generate);
    assert!("sometimes".parse::<TopicMode>().is_err());
    assert_eq!(TopicMode::Skip.to_string(), "skip");
    assert_eq!(
        serde_json::to_string(&TopicMode::Contextual).unwrap(),
        "\"contextual\""
    );
}
