//! Construction of the built-in element kinds

use flow_engine::{Element, ElementDefinition, ElementFactory, ElementKind, Result};

use crate::ai::{LlmStructuredElement, LlmTextElement};
use crate::custom::CustomElement;
use crate::flow_control::{CaseElement, EndElement, FlowSelectElement, StartElement};
use crate::inputs::{
    ChatInputElement, ConstantsElement, ContextHistoryElement, DatablockElement, MetadataElement,
    RestApiElement,
};
use crate::onchain::{BuildTransactionJsonElement, ReadBlockchainDataElement};
use crate::util::{MergerElement, RandomGeneratorElement, SelectorElement, TimeElement};

/// Factory covering every [`ElementKind`].
///
/// ```ignore
/// let executor = FlowExecutor::from_definition(&flow, &BuiltinElements::new(), config)?;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinElements;

impl BuiltinElements {
    pub fn new() -> Self {
        Self
    }
}

impl ElementFactory for BuiltinElements {
    fn build(&self, kind: ElementKind, def: &ElementDefinition) -> Result<Box<dyn Element>> {
        Ok(match kind {
            ElementKind::Start => Box::new(StartElement::new(def)),
            ElementKind::End => Box::new(EndElement::new(def)),
            ElementKind::Case => Box::new(CaseElement::new(def)?),
            ElementKind::FlowSelect => Box::new(FlowSelectElement::new(def)?),
            ElementKind::ChatInput => Box::new(ChatInputElement::new(def)?),
            ElementKind::ContextHistory => Box::new(ContextHistoryElement::new(def)?),
            ElementKind::Datablock => Box::new(DatablockElement::new(def)?),
            ElementKind::Constants => Box::new(ConstantsElement::new(def)?),
            ElementKind::Metadata => Box::new(MetadataElement::new(def)?),
            ElementKind::RestApi => Box::new(RestApiElement::new(def)?),
            ElementKind::Selector => Box::new(SelectorElement::new(def)?),
            ElementKind::Merger => Box::new(MergerElement::new(def)),
            ElementKind::RandomGenerator => Box::new(RandomGeneratorElement::new(def)?),
            ElementKind::Time => Box::new(TimeElement::new(def)?),
            ElementKind::LlmText => Box::new(LlmTextElement::new(def)?),
            ElementKind::LlmStructured => Box::new(LlmStructuredElement::new(def)?),
            ElementKind::ReadBlockchainData => Box::new(ReadBlockchainDataElement::new(def)?),
            ElementKind::BuildTransactionJson => Box::new(BuildTransactionJsonElement::new(def)?),
            ElementKind::Custom => Box::new(CustomElement::new(def)?),
        })
    }
}
