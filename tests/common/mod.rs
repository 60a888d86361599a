//! Shared fixtures for integration tests

/// A three-measure closed SATB score on two staves.
///
/// - Part P1 (treble): lane "1" soprano with lyrics, lane "2" alto with a
///   G4-A4 slur in measure 2 and a crescendo wedge across measure 2
/// - Part P2 (bass): lane "1" tenor, lane "2" bass
/// - A forte marking in P1 measure 1, a metronome mark in P2 measure 1
pub const CLOSED_SATB_SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <movement-title>Evening hymn</movement-title>
  <part-list>
    <score-part id="P1"><part-name>Upper staff</part-name></score-part>
    <score-part id="P2"><part-name>Lower staff</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes>
        <divisions>2</divisions>
        <key><fifths>0</fifths></key>
        <time><beats>4</beats><beat-type>4</beat-type></time>
        <clef><sign>G</sign><line>2</line></clef>
      </attributes>
      <direction placement="below">
        <direction-type><dynamics><f/></dynamics></direction-type>
      </direction>
      <note>
        <pitch><step>C</step><octave>5</octave></pitch>
        <duration>4</duration>
        <voice>1</voice>
        <lyric number="1"><syllabic>single</syllabic><text>sun</text></lyric>
      </note>
      <note>
        <pitch><step>D</step><octave>5</octave></pitch>
        <duration>4</duration>
        <voice>1</voice>
        <lyric number="1"><syllabic>single</syllabic><text>rise</text></lyric>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>A</step><octave>4</octave></pitch>
        <duration>8</duration>
        <voice>2</voice>
      </note>
    </measure>
    <measure number="2">
      <direction>
        <direction-type><wedge type="crescendo"/></direction-type>
      </direction>
      <note>
        <pitch><step>E</step><octave>5</octave></pitch>
        <duration>8</duration>
        <voice>1</voice>
        <lyric number="1"><syllabic>single</syllabic><text>high</text></lyric>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>G</step><octave>4</octave></pitch>
        <duration>2</duration>
        <voice>2</voice>
        <notations><slur type="start" number="1"/></notations>
      </note>
      <note>
        <pitch><step>A</step><octave>4</octave></pitch>
        <duration>2</duration>
        <voice>2</voice>
        <notations><slur type="stop" number="1"/></notations>
      </note>
      <note>
        <pitch><step>F</step><octave>4</octave></pitch>
        <duration>4</duration>
        <voice>2</voice>
      </note>
      <direction>
        <direction-type><wedge type="stop"/></direction-type>
      </direction>
    </measure>
    <measure number="3">
      <note>
        <pitch><step>C</step><octave>5</octave></pitch>
        <duration>8</duration>
        <voice>1</voice>
        <lyric number="1"><syllabic>single</syllabic><text>home</text></lyric>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>A</step><octave>4</octave></pitch>
        <duration>8</duration>
        <voice>2</voice>
      </note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes>
        <divisions>2</divisions>
        <key><fifths>0</fifths></key>
        <time><beats>4</beats><beat-type>4</beat-type></time>
        <clef><sign>F</sign><line>4</line></clef>
      </attributes>
      <direction placement="above">
        <direction-type>
          <metronome><beat-unit>quarter</beat-unit><per-minute>90</per-minute></metronome>
        </direction-type>
      </direction>
      <note>
        <pitch><step>F</step><octave>3</octave></pitch>
        <duration>8</duration>
        <voice>1</voice>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>F</step><octave>2</octave></pitch>
        <duration>8</duration>
        <voice>2</voice>
      </note>
    </measure>
    <measure number="2">
      <note>
        <pitch><step>F</step><octave>3</octave></pitch>
        <duration>8</duration>
        <voice>1</voice>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>F</step><octave>2</octave></pitch>
        <duration>8</duration>
        <voice>2</voice>
      </note>
    </measure>
    <measure number="3">
      <note>
        <pitch><step>F</step><octave>3</octave></pitch>
        <duration>8</duration>
        <voice>1</voice>
      </note>
      <backup><duration>8</duration></backup>
      <note>
        <pitch><step>F</step><octave>2</octave></pitch>
        <duration>8</duration>
        <voice>2</voice>
      </note>
    </measure>
  </part>
</score-partwise>"#;
