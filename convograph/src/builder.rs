//! Graph model construction.
//!
//! Turns one conversation's ordered segments into typed nodes and relationships.
//! Everything is built in memory in a single time-ordered pass; nothing touches
//! storage here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edges::{
    ContainsEdge, DiscussesEdge, FollowsEdge, GraphRelationship, MentionsEdge, RelationshipType,
    SpeaksInEdge,
};
use crate::errors::{ConvographError, Result};
use crate::extraction::ExtractionPlan;
use crate::identity;
use crate::nodes::{ConversationNode, EntityNode, GraphNode, SegmentNode, SpeakerNode, TopicNode};
use crate::transcript::{max_end, validate_segments, Segment, UNKNOWN_SPEAKER};

/// One conversation handed to the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationInput {
    pub conversation_id: String,
    pub audio_file_id: String,
    pub language: String,
    /// Engine-reported duration in seconds, if any.
    pub duration: Option<f64>,
    pub segments: Vec<Segment>,
}

/// The typed node and relationship set of one conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphModel {
    pub conversation: Option<ConversationNode>,
    pub speakers: Vec<SpeakerNode>,
    pub topics: Vec<TopicNode>,
    pub entities: Vec<EntityNode>,
    /// In time order.
    pub segments: Vec<SegmentNode>,
    pub relationships: Vec<GraphRelationship>,
}

impl GraphModel {
    /// All nodes, conversation first, segments last.
    pub fn nodes(&self) -> Vec<GraphNode> {
        let mut nodes = Vec::with_capacity(self.node_count());
        nodes.extend(self.conversation.clone().map(GraphNode::Conversation));
        nodes.extend(self.speakers.iter().cloned().map(GraphNode::Speaker));
        nodes.extend(self.topics.iter().cloned().map(GraphNode::Topic));
        nodes.extend(self.entities.iter().cloned().map(GraphNode::Entity));
        nodes.extend(self.segments.iter().cloned().map(GraphNode::Segment));
        nodes
    }

    pub fn node_count(&self) -> usize {
        usize::from(self.conversation.is_some())
            + self.speakers.len()
            + self.topics.len()
            + self.entities.len()
            + self.segments.len()
    }

    pub fn relationships_of(
        &self,
        rel_type: RelationshipType,
    ) -> impl Iterator<Item = &GraphRelationship> {
        self.relationships
            .iter()
            .filter(move |r| r.relationship_type() == rel_type)
    }

    pub fn speaker(&self, label: &str) -> Option<&SpeakerNode> {
        self.speakers.iter().find(|s| s.label == label)
    }
}

/// Builds [`GraphModel`]s with a fixed extraction plan.
#[derive(Clone, Default)]
pub struct GraphModelBuilder {
    plan: ExtractionPlan,
}

impl GraphModelBuilder {
    pub fn new(plan: ExtractionPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &ExtractionPlan {
        &self.plan
    }

    /// Build the model for one conversation.
    ///
    /// Fails only on malformed input. Extraction failures for a segment leave that
    /// segment without topics or entities.
    pub async fn build(&self, input: &ConversationInput) -> Result<GraphModel> {
        if input.conversation_id.trim().is_empty() {
            return Err(ConvographError::Input(
                "conversation id must not be empty".to_string(),
            ));
        }
        validate_segments(&input.segments)?;

        let conversation_id = input.conversation_id.as_str();
        let duration = input
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or_else(|| max_end(&input.segments));

        // Stable: segments sharing a start keep their engine order.
        let mut ordered: Vec<&Segment> = input.segments.iter().collect();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut model = GraphModel::default();
        let mut speaker_index: HashMap<String, usize> = HashMap::new();
        let mut topic_index: HashMap<String, usize> = HashMap::new();
        let mut entity_index: HashMap<String, usize> = HashMap::new();
        let mut discusses: Vec<DiscussesEdge> = Vec::new();
        let mut discusses_index: HashMap<(String, String), usize> = HashMap::new();
        let mut mentions: Vec<MentionsEdge> = Vec::new();
        let mut mentions_index: HashMap<(String, String), usize> = HashMap::new();
        let mut contains = Vec::with_capacity(ordered.len());
        let mut follows = Vec::with_capacity(ordered.len().saturating_sub(1));

        for (position, segment) in ordered.iter().enumerate() {
            let label = match segment.speaker.trim() {
                "" => UNKNOWN_SPEAKER,
                label => label,
            };

            let slot = *speaker_index.entry(label.to_string()).or_insert_with(|| {
                model.speakers.push(SpeakerNode::new(conversation_id, label));
                model.speakers.len() - 1
            });
            let speaker = &mut model.speakers[slot];
            speaker.record_turn(segment.duration());
            let speaker_id = speaker.id.clone();

            let node = SegmentNode {
                id: identity::segment_id(conversation_id, position),
                conversation_id: conversation_id.to_string(),
                text: segment.text.clone(),
                start_time: segment.start,
                end_time: segment.end,
                speaker_id: speaker_id.clone(),
                confidence_score: segment.confidence,
                sentiment: self.plan.sentiment(&segment.text).await,
            };

            let topics = fold_by_id(
                self.plan.topics(&segment.text).await,
                |t| (!t.name.trim().is_empty()).then(|| identity::topic_id(&t.name)),
                |t| &mut t.confidence,
            );
            for (topic_id, topic) in topics {
                match topic_index.get(&topic_id) {
                    Some(&i) => model.topics[i].record_mention(topic.confidence),
                    None => {
                        topic_index.insert(topic_id.clone(), model.topics.len());
                        model
                            .topics
                            .push(TopicNode::new(&topic.name, topic.keywords, topic.confidence));
                    }
                }
                let key = (speaker_id.clone(), topic_id.clone());
                match discusses_index.get(&key) {
                    Some(&i) => discusses[i].record_mention(topic.confidence),
                    None => {
                        discusses_index.insert(key, discusses.len());
                        discusses.push(DiscussesEdge::new(&speaker_id, &topic_id, topic.confidence));
                    }
                }
            }

            let entities = fold_by_id(
                self.plan.entities(&segment.text).await,
                |e| {
                    (!e.text.trim().is_empty())
                        .then(|| identity::entity_id(&e.entity_type, &e.text))
                },
                |e| &mut e.confidence,
            );
            for (entity_id, entity) in entities {
                match entity_index.get(&entity_id) {
                    Some(&i) => model.entities[i].record_mention(entity.confidence),
                    None => {
                        entity_index.insert(entity_id.clone(), model.entities.len());
                        model.entities.push(EntityNode::new(
                            &entity.text,
                            &entity.entity_type,
                            entity.confidence,
                        ));
                    }
                }
                let key = (node.id.clone(), entity_id.clone());
                match mentions_index.get(&key) {
                    Some(&i) => mentions[i].record_mention(entity.confidence),
                    None => {
                        mentions_index.insert(key, mentions.len());
                        mentions.push(MentionsEdge::new(
                            &node.id,
                            &entity_id,
                            &node.text,
                            &entity.text,
                            entity.confidence,
                        ));
                    }
                }
            }

            contains.push(ContainsEdge {
                conversation_id: conversation_id.to_string(),
                segment_id: node.id.clone(),
                position,
            });
            if let Some(previous) = model.segments.last() {
                follows.push(FollowsEdge::between(previous, &node));
            }
            model.segments.push(node);
        }

        for speaker in &mut model.speakers {
            speaker.finalize(duration);
        }

        model.conversation = Some(ConversationNode {
            id: conversation_id.to_string(),
            audio_file_id: input.audio_file_id.clone(),
            duration,
            language: input.language.clone(),
            speaker_count: model.speakers.len(),
            topic_count: model.topics.len(),
            entity_count: model.entities.len(),
            segment_count: model.segments.len(),
        });

        let speaks_in = model
            .speakers
            .iter()
            .map(|s| GraphRelationship::SpeaksIn(SpeaksInEdge::from_speaker(s)));
        model.relationships = speaks_in
            .chain(contains.into_iter().map(GraphRelationship::Contains))
            .chain(follows.into_iter().map(GraphRelationship::Follows))
            .chain(discusses.into_iter().map(GraphRelationship::Discusses))
            .chain(mentions.into_iter().map(GraphRelationship::Mentions))
            .collect();

        debug!(
            conversation_id,
            nodes = model.node_count(),
            relationships = model.relationships.len(),
            topic_strategy = self.plan.topic_strategy(),
            entity_strategy = self.plan.entity_strategy(),
            "graph model built"
        );
        Ok(model)
    }
}

/// Collapse candidates sharing an ID into the first occurrence, which keeps the
/// highest confidence seen. Candidates without an ID are dropped.
fn fold_by_id<T>(
    found: Vec<T>,
    id: impl Fn(&T) -> Option<String>,
    confidence: fn(&mut T) -> &mut f64,
) -> Vec<(String, T)> {
    let mut folded: Vec<(String, T)> = Vec::with_capacity(found.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for mut candidate in found {
        let Some(candidate_id) = id(&candidate) else {
            continue;
        };
        match index.get(&candidate_id) {
            Some(&i) => {
                let incoming = *confidence(&mut candidate);
                let kept = confidence(&mut folded[i].1);
                *kept = kept.max(incoming);
            }
            None => {
                index.insert(candidate_id.clone(), folded.len());
                folded.push((candidate_id, candidate));
            }
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{
        EntityCandidate, Extractor, SegmentSentiment, SentimentAnalyzer, TopicCandidate,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Reports every topic and entity twice, weak first.
    struct Doubling;

    #[async_trait]
    impl Extractor for Doubling {
        fn name(&self) -> &str {
            "doubling"
        }

        async fn extract_topics(&self, _text: &str) -> Result<Vec<TopicCandidate>> {
            let topic = |confidence| TopicCandidate {
                name: "Budget".to_string(),
                confidence,
                keywords: vec![],
            };
            Ok(vec![topic(0.4), topic(0.9)])
        }

        async fn extract_entities(&self, _text: &str) -> Result<Vec<EntityCandidate>> {
            let entity = |text: &str, confidence| EntityCandidate {
                text: text.to_string(),
                entity_type: "ORG".to_string(),
                confidence,
            };
            Ok(vec![entity("Acme", 0.3), entity(" acme ", 0.8)])
        }
    }

    struct Mood(Option<&'static str>);

    #[async_trait]
    impl SentimentAnalyzer for Mood {
        fn name(&self) -> &str {
            "mood"
        }

        async fn analyze_sentiment(&self, _text: &str) -> Result<Option<SegmentSentiment>> {
            match self.0 {
                Some(label) => Ok(Some(SegmentSentiment {
                    label: label.to_string(),
                    confidence: 0.7,
                    emotions: vec!["joy".to_string()],
                    intensity: 0.4,
                })),
                None => Err(ConvographError::Extraction("model offline".to_string())),
            }
        }
    }

    fn input(segments: Vec<Segment>, duration: Option<f64>) -> ConversationInput {
        ConversationInput {
            conversation_id: "conv".to_string(),
            audio_file_id: "audio-1".to_string(),
            language: "en".to_string(),
            duration,
            segments,
        }
    }

    fn follows(model: &GraphModel) -> Vec<&FollowsEdge> {
        model
            .relationships
            .iter()
            .filter_map(|r| match r {
                GraphRelationship::Follows(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_phone_scenario() {
        let segments = vec![
            Segment::new(0.0, 5.0, "Call me at 555-111-2222", "s1"),
            Segment::new(5.0, 9.0, "Sure, I will", "s2"),
        ];
        let model = GraphModelBuilder::default()
            .build(&input(segments, Some(9.0)))
            .await
            .unwrap();

        assert_eq!(model.entities.len(), 1);
        assert_eq!(model.entities[0].entity_type, "PHONE");
        assert_eq!(model.entities[0].text, "555-111-2222");
        assert_eq!(model.speakers.len(), 2);

        let chain = follows(&model);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].time_gap, 0.0);
        assert!(chain[0].speaker_change);

        let s1 = model.speaker("s1").unwrap();
        let s2 = model.speaker("s2").unwrap();
        assert!((s1.participation_ratio - 5.0 / 9.0).abs() < 1e-3);
        assert!((s2.participation_ratio - 4.0 / 9.0).abs() < 1e-3);

        assert_eq!(model.relationships_of(RelationshipType::Mentions).count(), 1);
        assert_eq!(model.relationships_of(RelationshipType::Contains).count(), 2);
        assert_eq!(model.relationships_of(RelationshipType::SpeaksIn).count(), 2);
    }

    #[tokio::test]
    async fn test_follows_chain_is_time_ordered_and_unclamped() {
        let segments = vec![
            Segment::new(10.0, 12.0, "third", "a"),
            Segment::new(0.0, 6.0, "first", "a"),
            Segment::new(5.0, 11.0, "second", "b"),
            Segment::new(12.5, 13.0, "fourth", "b"),
        ];
        let model = GraphModelBuilder::default()
            .build(&input(segments, None))
            .await
            .unwrap();

        let texts: Vec<&str> = model.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third", "fourth"]);

        let chain = follows(&model);
        assert_eq!(chain.len(), 3);
        for (i, edge) in chain.iter().enumerate() {
            assert_eq!(edge.from_segment_id, model.segments[i].id);
            assert_eq!(edge.to_segment_id, model.segments[i + 1].id);
        }
        // Overlapping speech keeps its negative gap.
        assert_eq!(chain[0].time_gap, -1.0);
        assert_eq!(model.conversation.as_ref().unwrap().duration, 13.0);
    }

    #[tokio::test]
    async fn test_zero_duration_gives_zero_ratio() {
        let segments = vec![
            Segment::new(0.0, 0.0, "hi", "a"),
            Segment::new(0.0, 0.0, "hello", "b"),
        ];
        let model = GraphModelBuilder::default()
            .build(&input(segments, Some(0.0)))
            .await
            .unwrap();
        assert!(model.speakers.iter().all(|s| s.participation_ratio == 0.0));
    }

    #[tokio::test]
    async fn test_repeated_topics_coalesce() {
        let segments = vec![
            Segment::new(0.0, 1.0, "the budget", "a"),
            Segment::new(1.0, 2.0, "budget and sales", "a"),
            Segment::new(2.0, 3.0, "more sales", "b"),
        ];
        let model = GraphModelBuilder::default()
            .build(&input(segments, None))
            .await
            .unwrap();

        assert_eq!(model.topics.len(), 1);
        assert_eq!(model.topics[0].mention_count, 3);

        let discusses: Vec<&DiscussesEdge> = model
            .relationships
            .iter()
            .filter_map(|r| match r {
                GraphRelationship::Discusses(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(discusses.len(), 2);
        assert_eq!(discusses[0].mention_count, 2);
        assert_eq!(discusses[1].mention_count, 1);
    }

    #[tokio::test]
    async fn test_missing_speaker_maps_to_unknown() {
        let segments = vec![Segment::new(0.0, 1.0, "hi", "  ")];
        let model = GraphModelBuilder::default()
            .build(&input(segments, None))
            .await
            .unwrap();
        assert_eq!(model.speakers[0].label, UNKNOWN_SPEAKER);
        assert_eq!(model.speakers[0].id, "conv_speaker_unknown");
    }

    #[tokio::test]
    async fn test_invalid_segments_are_input_errors() {
        let segments = vec![Segment::new(3.0, 1.0, "backwards", "a")];
        let err = GraphModelBuilder::default()
            .build(&input(segments, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvographError::Input(_)));
    }

    #[tokio::test]
    async fn test_empty_conversation() {
        let model = GraphModelBuilder::default()
            .build(&input(vec![], None))
            .await
            .unwrap();
        assert_eq!(model.node_count(), 1);
        assert!(model.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_within_segment_keep_strongest_confidence() {
        let doubling: Arc<dyn Extractor> = Arc::new(Doubling);
        let builder = GraphModelBuilder::new(ExtractionPlan::new(doubling.clone(), doubling));
        let segments = vec![Segment::new(0.0, 1.0, "Acme budget", "a")];
        let model = builder.build(&input(segments, None)).await.unwrap();

        assert_eq!(model.topics.len(), 1);
        assert_eq!(model.topics[0].confidence_score, 0.9);
        assert_eq!(model.topics[0].mention_count, 1);
        assert_eq!(model.entities.len(), 1);
        assert_eq!(model.entities[0].confidence_score, 0.8);
        assert_eq!(model.entities[0].mention_count, 1);
        assert_eq!(model.relationships_of(RelationshipType::Discusses).count(), 1);
        assert_eq!(model.relationships_of(RelationshipType::Mentions).count(), 1);
    }

    #[tokio::test]
    async fn test_segments_carry_sentiment_when_analyzed() {
        let plan = ExtractionPlan::keyword_only().with_sentiment(Arc::new(Mood(Some("positive"))));
        let segments = vec![Segment::new(0.0, 1.0, "great news", "a")];
        let model = GraphModelBuilder::new(plan)
            .build(&input(segments, None))
            .await
            .unwrap();

        let sentiment = model.segments[0].sentiment.as_ref().expect("sentiment");
        assert_eq!(sentiment.label, "positive");
        let props = model.segments[0].to_storage_properties();
        assert_eq!(props["sentiment"], "positive");
        assert_eq!(props["emotions"], serde_json::json!(["joy"]));
    }

    #[tokio::test]
    async fn test_failed_sentiment_leaves_segment_without_it() {
        let plan = ExtractionPlan::keyword_only().with_sentiment(Arc::new(Mood(None)));
        let segments = vec![Segment::new(0.0, 1.0, "great news", "a")];
        let model = GraphModelBuilder::new(plan)
            .build(&input(segments, None))
            .await
            .unwrap();
        assert!(model.segments[0].sentiment.is_none());
        assert!(!model.segments[0].to_storage_properties().contains_key("sentiment"));
    }
}
