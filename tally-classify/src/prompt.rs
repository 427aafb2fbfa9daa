//! Instruction template sent to the text generator, one call per description.
//!
//! Written in Portuguese so the instructions, the worked examples and the
//! category labels the model must echo all share one language.

use tally_core::Category;

/// Marker preceding the description in every example and in the final ask.
pub const INPUT_MARKER: &str = "Entrada:";
/// Marker the model is expected to complete.
pub const OUTPUT_MARKER: &str = "Saída:";

/// Worked input -> output pairs embedded in every prompt.
pub const EXAMPLES: [(&str, Category); 6] = [
    ("UBER *VIAGEM", Category::Transport),
    ("IFD*BRUNO MARQUES RODR", Category::Food),
    ("IFD*GRECCO DEMAZI ALIM", Category::Food),
    ("IFOOD CLUB", Category::Food),
    ("RAUL BURIM DE CARVALHO", Category::PeerTransfer),
    ("PAGAMENTO DE SALARIO", Category::Income),
];

const PREAMBLE: &str =
    "Você é um assistente contábil rigoroso. Sua tarefa é categorizar transações bancárias.";

const RULES: &str = "\
REGRAS OBRIGATÓRIAS:
1. Responda APENAS com uma das categorias da lista acima, escrita exatamente como está.
2. NÃO escreva frases, explicações ou pontuação; apenas a categoria.
3. Aplicativos de entrega: se contiver \"IFD\", \"IFOOD\", \"RAPPI\" ou \"UBER EATS\", a categoria é SEMPRE \"Alimentação\", mesmo que venha um nome de pessoa depois.
4. Aplicativos de corrida: se contiver \"UBER\" ou \"99APP\" (e não for \"UBER EATS\"), a categoria é \"Transporte\".
5. Se a descrição for apenas um nome de pessoa (sem IFD antes), a categoria é \"Transferências para terceiros\".";

/// Render the full prompt for one transaction description.
pub fn render_prompt(description: &str) -> String {
    let mut s = String::new();
    s.push_str(PREAMBLE);
    s.push_str("\n\nLISTA DE CATEGORIAS PERMITIDAS (use EXATAMENTE como escrito):\n");
    for c in Category::ALL {
        s.push_str(&format!("- {}\n", c.label()));
    }
    s.push('\n');
    s.push_str(RULES);
    s.push_str("\n\nEXEMPLOS:\n");
    for (input, output) in EXAMPLES {
        s.push_str(&format!(
            "{INPUT_MARKER} {input}\n{OUTPUT_MARKER} {}\n\n",
            output.label()
        ));
    }
    s.push_str("AGORA CLASSIFIQUE:\n");
    s.push_str(&format!(
        "{INPUT_MARKER} {}\n{OUTPUT_MARKER}",
        description.trim()
    ));
    s
}
