pub mod aihubmix;
pub mod anthropic;
pub mod bedrock;
pub mod gemini;
pub mod mixed;
pub mod new_api;
pub mod openai_compat;
pub mod ppio;
pub mod vertex;
pub mod zhipu;
